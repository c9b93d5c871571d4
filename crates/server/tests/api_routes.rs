use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tonelink_core::session::SignedUrlSource;
use tonelink_core::{ModelClient, SessionError};
use tonelink_server::{AppState, app};
use tonelink_test_model::{PresetOutcome, TestModelProvider};
use tower::ServiceExt;

struct FixedSigner;

#[async_trait]
impl SignedUrlSource for FixedSigner {
    async fn signed_url(&self, agent_id: &str) -> Result<String, SessionError> {
        if agent_id == "broken" {
            return Err(SessionError::Network("connection reset".to_owned()));
        }
        Ok(format!("wss://voice.test/{agent_id}?token=abc"))
    }
}

fn conversation() -> Value {
    json!({
        "messages": [
            { "role": "system", "content": "You are a receptionist." },
            { "role": "user", "content": "[GL MODE]: Table for two?" },
        ],
        "agentType": "inbound",
        "sessionId": "2b1c3d4e",
    })
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (status, body) = send(app(AppState::default()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_returns_assistant_message() {
    let provider = TestModelProvider::with_outcomes(
        "openai",
        [PresetOutcome::reply("Sure, for what time?")],
    );
    let state = AppState {
        chat: Some(ModelClient::new(provider.clone())),
        ..Default::default()
    };

    let (status, body) = send(app(state), post("/chat", &conversation())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "role": "assistant", "content": "Sure, for what time?" })
    );
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(
        requests[0].messages[1].content(),
        "[GL MODE]: Table for two?"
    );
}

#[tokio::test]
async fn groq_uses_secondary_provider() {
    let chat = TestModelProvider::named("openai");
    let groq = TestModelProvider::with_outcomes(
        "groq",
        [PresetOutcome::reply("Hello from the backup")],
    );
    let state = AppState {
        chat: Some(ModelClient::new(chat.clone())),
        groq: Some(ModelClient::new(groq.clone())),
        ..Default::default()
    };

    let (status, body) = send(app(state), post("/groq", &conversation())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Hello from the backup");
    assert_eq!(chat.call_count(), 0);
    assert_eq!(groq.call_count(), 1);
}

#[tokio::test]
async fn provider_failures_return_503() {
    for outcome in [PresetOutcome::Failure, PresetOutcome::Empty] {
        let provider = TestModelProvider::with_outcomes("openai", [outcome]);
        let state = AppState {
            chat: Some(ModelClient::new(provider)),
            ..Default::default()
        };
        let (status, body) =
            send(app(state), post("/chat", &conversation())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "error": "AI Service Unavailable" }));
    }
}

#[tokio::test]
async fn unconfigured_provider_returns_503() {
    let (status, body) =
        send(app(AppState::default()), post("/groq", &conversation())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "AI Service Unavailable");
}

#[tokio::test]
async fn malformed_body_returns_503() {
    let openai = TestModelProvider::named("openai");
    openai.add_reply("unused");
    let state = AppState {
        chat: Some(ModelClient::new(openai.clone())),
        ..Default::default()
    };

    let req = post("/chat", &json!({ "messages": [{ "role": "robot" }] }));
    let (status, body) = send(app(state.clone()), req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "AI Service Unavailable" }));

    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .body(Body::from("{\"messages\": ["))
        .unwrap();
    let (status, body) = send(app(state), req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "AI Service Unavailable" }));
    assert_eq!(openai.call_count(), 0);
}

#[tokio::test]
async fn signed_url_route() {
    let state = AppState {
        signer: Some(Arc::new(FixedSigner)),
        ..Default::default()
    };

    let (status, body) =
        send(app(state.clone()), get("/signed-url?agentId=agent-in")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "signedUrl": "wss://voice.test/agent-in?token=abc" })
    );

    let (status, _) =
        send(app(state.clone()), get("/signed-url?agentId=broken")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(app(state), get("/signed-url")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "agentId is required");
}

#[tokio::test]
async fn signed_url_without_vendor_key_returns_503() {
    let (status, _) =
        send(app(AppState::default()), get("/signed-url?agentId=agent-in"))
            .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
