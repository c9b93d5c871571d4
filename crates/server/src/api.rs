//! HTTP handlers of the relay.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tonelink_core::ModelClient;
use tonelink_core::model::Message;
use tonelink_core::session::SignedUrlSource as _;
use tracing::Instrument;

use crate::AppState;

/// Body of `POST /chat` and `POST /groq`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionBody {
    /// The full conversation, system prompt first.
    pub messages: Vec<Message>,
    /// The persona of the caller, only used for logging.
    #[serde(default)]
    pub agent_type: Option<String>,
    /// The caller's session, only used for logging.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Query of `GET /signed-url`.
#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Completion from the primary provider.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<CompletionBody>, JsonRejection>,
) -> Response {
    complete(state.chat.as_ref(), body).await
}

/// Completion from the secondary provider.
pub async fn groq(
    State(state): State<AppState>,
    body: Result<Json<CompletionBody>, JsonRejection>,
) -> Response {
    complete(state.groq.as_ref(), body).await
}

/// Every failure, an unreadable body included, is answered with 503.
async fn complete(
    client: Option<&ModelClient>,
    body: Result<Json<CompletionBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("unreadable completion request: {rejection}");
            return unavailable("AI Service Unavailable");
        }
    };
    let Some(client) = client else {
        warn!("provider is not configured");
        return unavailable("AI Service Unavailable");
    };

    let span = info_span!(
        "completion",
        provider = client.name(),
        agent_type = body.agent_type.as_deref().unwrap_or("-"),
        session_id = body.session_id.as_deref().unwrap_or("-"),
    );
    let result = client.complete(&body.messages).instrument(span).await;
    match result.text() {
        Some(text) => Json(Message::assistant(text)).into_response(),
        None => unavailable("AI Service Unavailable"),
    }
}

/// Signs a voice session URL for the requested agent.
pub async fn signed_url(
    State(state): State<AppState>,
    Query(query): Query<SignedUrlQuery>,
) -> Response {
    let Some(agent_id) = query.agent_id.filter(|id| !id.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "agentId is required" })),
        )
            .into_response();
    };
    let Some(signer) = &state.signer else {
        warn!("voice vendor is not configured");
        return unavailable("Failed to get signed URL");
    };

    match signer.signed_url(&agent_id).await {
        Ok(url) => Json(json!({ "signedUrl": url })).into_response(),
        Err(err) => {
            error!(agent_id = %agent_id, "failed to sign voice session url: {err}");
            unavailable("Failed to get signed URL")
        }
    }
}

fn unavailable(message: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": message })),
    )
        .into_response()
}
