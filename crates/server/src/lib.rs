//! HTTP relay between the browser widget and the model and voice vendors.
//!
//! Exposes two interchangeable completion routes (`/chat` for the primary
//! provider, `/groq` for the secondary one), a signing route for voice
//! sessions, and a health check.

#[macro_use]
extern crate tracing;

pub mod api;
pub mod config;
mod signer;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tonelink_core::ModelClient;
use tonelink_core::session::SignedUrlSource;
use tonelink_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use tower_http::trace::TraceLayer;

pub use signer::ElevenLabsSigner;

use crate::config::ProvidersConfig;

/// Shared state of the handlers. Unset entries answer with 503.
#[derive(Clone, Default)]
pub struct AppState {
    /// The provider behind `/chat`.
    pub chat: Option<ModelClient>,
    /// The provider behind `/groq`.
    pub groq: Option<ModelClient>,
    /// The signer behind `/signed-url`.
    pub signer: Option<Arc<dyn SignedUrlSource>>,
}

impl AppState {
    /// Builds the vendor clients for every configured key.
    pub fn from_config(providers: &ProvidersConfig) -> Self {
        let timeout = providers.timeout();
        let client = |config| {
            ModelClient::new(OpenAIProvider::new(config)).with_timeout(timeout)
        };

        let chat = providers.openai_api_key.as_ref().map(|key| {
            client(OpenAIConfigBuilder::openai(key.clone()).build())
        });
        let groq = providers.groq_api_key.as_ref().map(|key| {
            client(OpenAIConfigBuilder::groq(key.clone()).build())
        });
        let signer = providers.elevenlabs_api_key.as_ref().map(|key| {
            Arc::new(ElevenLabsSigner::new(key.clone()))
                as Arc<dyn SignedUrlSource>
        });

        for (route, enabled) in [
            ("/chat", chat.is_some()),
            ("/groq", groq.is_some()),
            ("/signed-url", signer.is_some()),
        ] {
            if !enabled {
                warn!(route, "no api key configured, route will answer 503");
            }
        }

        Self { chat, groq, signer }
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/chat", post(api::chat))
        .route("/groq", post(api::groq))
        .route("/signed-url", get(api::signed_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
