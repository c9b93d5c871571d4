//! Clients for the relay server routes.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonelink_core::session::SignedUrlSource;
use tonelink_core::{Persona, SessionError};
use tonelink_model::{
    Completion, ErrorKind, Message, ModelProvider, ModelRequest,
};
pub use tonelink_openai_model::Error;
use uuid::Uuid;

/// One client session against a relay server.
///
/// Every request made through providers created from the same session
/// carries the same session id.
#[derive(Clone, Debug)]
pub struct RelaySession {
    client: Client,
    server_url: Arc<str>,
    session_id: Arc<str>,
}

impl RelaySession {
    /// Starts a new session with a random id.
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            server_url: Arc::from(server_url.trim_end_matches('/')),
            session_id: Arc::from(Uuid::new_v4().to_string()),
        }
    }

    /// Returns the session id.
    #[inline]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns a provider for the primary route.
    #[inline]
    pub fn chat(&self) -> RouteProvider {
        RouteProvider::new(self.clone(), "chat")
    }

    /// Returns a provider for the secondary route.
    #[inline]
    pub fn groq(&self) -> RouteProvider {
        RouteProvider::new(self.clone(), "groq")
    }

    /// Returns a signer backed by the signing route.
    #[inline]
    pub fn signer(&self) -> RelaySigner {
        RelaySigner {
            session: self.clone(),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.server_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteRequest<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_type: Option<Persona>,
    session_id: &'a str,
}

/// A model provider that goes through one of the relay's completion routes.
#[derive(Clone, Debug)]
pub struct RouteProvider {
    session: RelaySession,
    route: &'static str,
}

impl RouteProvider {
    fn new(session: RelaySession, route: &'static str) -> Self {
        Self { session, route }
    }
}

impl ModelProvider for RouteProvider {
    type Error = Error;

    fn name(&self) -> &str {
        self.route
    }

    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Completion, Self::Error>> + Send + 'static
    {
        let agent_type = req
            .messages
            .first()
            .and_then(|msg| Persona::from_system_prompt(msg.content()));
        let body = RouteRequest {
            messages: &req.messages,
            agent_type,
            session_id: self.session.session_id(),
        };
        let resp_fut = self
            .session
            .client
            .post(self.session.url(self.route))
            .json(&body)
            .send();
        let route = self.route;

        async move {
            let resp = resp_fut.await?;
            if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                return Err(Error::new(
                    format!("/{route} is unavailable"),
                    ErrorKind::Status,
                ));
            }
            let raw: Value = resp.error_for_status()?.json().await?;
            let message: Message = serde_json::from_value(raw.clone())
                .map_err(|err| {
                    Error::new(format!("{err}"), ErrorKind::MalformedPayload)
                })?;
            let completion = Completion {
                message: Some(message),
                raw,
            };
            if completion.text().is_none() {
                return Err(Error::new(
                    format!("no content from /{route}"),
                    ErrorKind::EmptyContent,
                ));
            }
            Ok(completion)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedUrlBody {
    signed_url: Option<String>,
}

/// Fetches signed voice session URLs from the relay's signing route.
#[derive(Clone, Debug)]
pub struct RelaySigner {
    session: RelaySession,
}

#[async_trait]
impl SignedUrlSource for RelaySigner {
    async fn signed_url(&self, agent_id: &str) -> Result<String, SessionError> {
        let network = |err: reqwest::Error| SessionError::Network(err.to_string());
        let url = Url::parse_with_params(
            &self.session.url("signed-url"),
            &[("agentId", agent_id)],
        )
        .map_err(|err| SessionError::Network(err.to_string()))?;
        let body: SignedUrlBody = self
            .session
            .client
            .get(url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(network)?
            .json()
            .await
            .map_err(network)?;
        body.signed_url.filter(|url| !url.is_empty()).ok_or_else(|| {
            SessionError::VendorEmptyResponse("no signed url".to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tonelink_model::ModelProviderError;

    use super::*;

    #[test]
    fn test_route_request_shape() {
        let messages = [
            Message::system(Persona::Outbound.system_prompt()),
            Message::user("[GL MODE]: hi"),
        ];
        let body = RouteRequest {
            messages: &messages,
            agent_type: Persona::from_system_prompt(messages[0].content()),
            session_id: "abc",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["agentType"], "outbound");
        assert_eq!(value["sessionId"], "abc");
        assert_eq!(
            value["messages"][1],
            json!({ "role": "user", "content": "[GL MODE]: hi" })
        );
    }

    #[test]
    fn test_session_urls() {
        let session = RelaySession::new("http://localhost:3000/");
        assert_eq!(session.url("chat"), "http://localhost:3000/chat");
        assert_eq!(session.chat().name(), "chat");
        assert_eq!(session.groq().name(), "groq");
        assert!(Uuid::parse_str(session.session_id()).is_ok());
        assert_ne!(
            session.session_id(),
            RelaySession::new("http://localhost:3000").session_id()
        );
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let provider = RelaySession::new("http://127.0.0.1:9").chat();
        let req = ModelRequest::new(vec![Message::system("persona")]);
        let err = provider.complete(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
