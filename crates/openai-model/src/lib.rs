//! A model provider for OpenAI-compatible chat-completion APIs.
//!
//! Both relay vendors (OpenAI and Groq) speak this wire format, so one
//! provider type covers them; see [`OpenAIConfigBuilder::openai`] and
//! [`OpenAIConfigBuilder::groq`].

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, header};
use serde_json::Value;
use tonelink_model::{
    Completion, ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};

/// Error type for [`OpenAIProvider`].
///
/// Also used by other HTTP-backed providers; transport failures convert
/// from [`reqwest::Error`] with the matching [`ErrorKind`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_status() {
            ErrorKind::Status
        } else if err.is_decode() {
            ErrorKind::MalformedPayload
        } else {
            ErrorKind::Network
        };
        Self::new(format!("{err}"), kind)
    }
}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Completion, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let mut req_builder = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::ACCEPT, "application/json")
            .json(&openai_req);
        if let Some(timeout) = self.config.timeout {
            req_builder = req_builder.timeout(timeout);
        }
        let resp_fut = req_builder.send();
        let name = self.config.name.clone();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_json = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype() == mime::JSON)
                .unwrap_or(false);
            if !is_json {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::MalformedPayload,
                ));
            }

            let raw: Value = resp.json().await.map_err(Error::from)?;
            let completion = proto::parse_completion(raw).map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::MalformedPayload)
            })?;
            if completion.text().is_none() {
                return Err(Error::new(
                    format!("no content from {name}"),
                    ErrorKind::EmptyContent,
                ));
            }
            trace!("{name} completion: {:?}", completion.message);
            Ok(completion)
        }
    }
}
