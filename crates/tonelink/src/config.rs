use std::time::Duration;

use tonelink_core::model::ModelProvider;
use tonelink_core::{
    AgentDirectory, ModelClient, Orchestrator, Persona, SessionError,
};
use tonelink_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

use crate::relay::RelaySession;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Where replies come from.
#[derive(Clone, PartialEq, Eq)]
pub enum Backend {
    /// Through the relay server's `/chat` and `/groq` routes.
    Relay {
        /// Base URL of the relay server.
        server_url: String,
    },
    /// Straight to the vendors.
    Direct {
        /// Key for the primary provider.
        openai_api_key: String,
        /// Key for the secondary provider.
        groq_api_key: String,
    },
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Relay { server_url } => f
                .debug_struct("Relay")
                .field("server_url", server_url)
                .finish(),
            Backend::Direct { .. } => f
                .debug_struct("Direct")
                .field("openai_api_key", &"<redacted>")
                .field("groq_api_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Client configuration, usually read from the environment.
///
/// | variable | meaning |
/// |---|---|
/// | `TONELINK_SERVER_URL` | relay server, defaults to `http://127.0.0.1:3000` |
/// | `OPENAI_API_KEY`, `GROQ_API_KEY` | talk to the vendors directly when both are set and no server is given |
/// | `TONELINK_PERSONA` | initial persona, `inbound` or `outbound` |
/// | `TONELINK_INBOUND_AGENT_ID`, `TONELINK_OUTBOUND_AGENT_ID` | voice agents |
/// | `TONELINK_TIMEOUT_SECS` | per provider call timeout |
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Where replies come from.
    pub backend: Backend,
    /// The persona to start with.
    pub persona: Persona,
    /// Voice agent ids.
    pub directory: AgentDirectory,
    /// Per provider call timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SessionError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match (
            var("TONELINK_SERVER_URL"),
            var("OPENAI_API_KEY"),
            var("GROQ_API_KEY"),
        ) {
            (Some(server_url), _, _) => Backend::Relay { server_url },
            (None, Some(openai_api_key), Some(groq_api_key)) => {
                Backend::Direct {
                    openai_api_key,
                    groq_api_key,
                }
            }
            (None, _, _) => Backend::Relay {
                server_url: DEFAULT_SERVER_URL.to_owned(),
            },
        };

        let persona = match var("TONELINK_PERSONA") {
            Some(value) => value.parse().map_err(|_| {
                SessionError::InvalidConfiguration {
                    name: "TONELINK_PERSONA".to_owned(),
                    value: value.clone(),
                }
            })?,
            None => Persona::default(),
        };

        let timeout = var("TONELINK_TIMEOUT_SECS")
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(tonelink_core::DEFAULT_TIMEOUT);

        Ok(Self {
            backend,
            persona,
            directory: AgentDirectory::from_lookup(&lookup),
            timeout,
        })
    }

    /// Builds the reply source for this configuration.
    ///
    /// Also returns the relay session, if replies go through the relay.
    pub fn orchestrator(&self) -> (Orchestrator, Option<RelaySession>) {
        match &self.backend {
            Backend::Relay { server_url } => {
                let session = RelaySession::new(server_url);
                info!("relay session {} at {server_url}", session.session_id());
                let orchestrator = Orchestrator::new(
                    self.client(session.chat()),
                    self.client(session.groq()),
                );
                (orchestrator, Some(session))
            }
            Backend::Direct {
                openai_api_key,
                groq_api_key,
            } => {
                let primary = OpenAIConfigBuilder::openai(openai_api_key.clone());
                let secondary = OpenAIConfigBuilder::groq(groq_api_key.clone());
                let orchestrator = Orchestrator::new(
                    self.client(OpenAIProvider::new(primary.build())),
                    self.client(OpenAIProvider::new(secondary.build())),
                );
                (orchestrator, None)
            }
        }
    }

    fn client<P: ModelProvider + 'static>(&self, provider: P) -> ModelClient {
        ModelClient::new(provider).with_timeout(self.timeout)
    }
}
