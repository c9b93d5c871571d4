use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tonelink_core::SessionError;
use tonelink_core::session::SignedUrlSource;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Deserialize)]
struct SignedUrlResponse {
    signed_url: Option<String>,
}

/// Obtains signed conversation URLs from the voice vendor.
#[derive(Clone)]
pub struct ElevenLabsSigner {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsSigner {
    /// Creates a signer using the vendor's public endpoint.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Points the signer at another host, mostly for testing.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self, agent_id: &str) -> Result<Url, SessionError> {
        Url::parse_with_params(
            &format!(
                "{}/v1/convai/conversation/get_signed_url",
                self.base_url
            ),
            &[("agent_id", agent_id)],
        )
        .map_err(|err| SessionError::Network(err.to_string()))
    }
}

#[async_trait]
impl SignedUrlSource for ElevenLabsSigner {
    async fn signed_url(&self, agent_id: &str) -> Result<String, SessionError> {
        let url = self.endpoint(agent_id)?;
        let network = |err: reqwest::Error| SessionError::Network(err.to_string());
        let resp = self
            .client
            .get(url)
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(network)?;
        let body: SignedUrlResponse = resp.json().await.map_err(network)?;
        body.signed_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                SessionError::VendorEmptyResponse("no signed url".to_owned())
            })
    }
}
