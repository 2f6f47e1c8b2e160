//! HTTP contract tests for the reqwest-backed webhook dispatcher.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use weir_core::{PoolId, SlotId, UserId};
use weir_intake::message::{IntakeMessage, IntakeState};
use weir_intake::webhook::{
    HttpWebhookDispatcher, WebhookDispatcher, WebhookOutcome, IDEMPOTENCY_KEY_HEADER,
};

#[derive(Clone, Copy)]
enum ServerMode {
    Accept,
    Reject { status: u16 },
    Delay { millis: u64 },
}

#[derive(Clone)]
struct ServerState {
    mode: ServerMode,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn hook_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.seen.lock().expect("seen lock").push((key, body));

    match state.mode {
        ServerMode::Accept => StatusCode::OK,
        ServerMode::Reject { status } => {
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ServerMode::Delay { millis } => {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            StatusCode::OK
        }
    }
}

async fn start_server(mode: ServerMode) -> (String, ServerState, tokio::task::JoinHandle<()>) {
    let state = ServerState {
        mode,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/hook", post(hook_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (format!("http://{addr}/hook"), state, handle)
}

fn intent() -> IntakeMessage {
    IntakeMessage {
        pool_id: PoolId::new("p1"),
        resource_id: SlotId::generate(),
        user_id: UserId::new("u1"),
        state: IntakeState::Queued,
    }
}

#[tokio::test]
async fn accepted_on_2xx_with_idempotency_header() {
    let (url, state, server) = start_server(ServerMode::Accept).await;
    let dispatcher = HttpWebhookDispatcher::new();
    let message = intent();

    let outcome = dispatcher.post(&url, &message, message.resource_id).await;
    assert_eq!(outcome, WebhookOutcome::Accepted);

    let seen = state.seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    let (key, body) = &seen[0];
    assert_eq!(key.as_deref(), Some(message.resource_id.to_string().as_str()));
    assert_eq!(body["resource_id"], message.resource_id.to_string());
    assert_eq!(body["state"], "queued");
    drop(seen);
    server.abort();
}

#[tokio::test]
async fn rejected_on_non_2xx() {
    let (url, _state, server) = start_server(ServerMode::Reject { status: 503 }).await;
    let dispatcher = HttpWebhookDispatcher::new();
    let message = intent();

    let outcome = dispatcher.post(&url, &message, message.resource_id).await;
    assert_eq!(outcome, WebhookOutcome::Rejected { status: 503 });
    server.abort();
}

#[tokio::test]
async fn unreachable_on_timeout() {
    let (url, _state, server) = start_server(ServerMode::Delay { millis: 500 }).await;
    let dispatcher = HttpWebhookDispatcher::with_timeout(Duration::from_millis(50));
    let message = intent();

    let outcome = dispatcher.post(&url, &message, message.resource_id).await;
    assert!(matches!(outcome, WebhookOutcome::Unreachable { .. }));
    server.abort();
}

#[tokio::test]
async fn unreachable_on_connect_failure() {
    // A port nothing listens on.
    let dispatcher = HttpWebhookDispatcher::with_timeout(Duration::from_millis(250));
    let message = intent();

    let outcome = dispatcher
        .post("http://127.0.0.1:9/hook", &message, message.resource_id)
        .await;
    assert!(matches!(outcome, WebhookOutcome::Unreachable { .. }));
}
