//! API server implementation.
//!
//! Wires the intake domain services behind the HTTP surface: health and
//! readiness probes, the Prometheus endpoint, and the versioned API routes.
//! This crate is a thin composition layer; all claim/drain/reap policy
//! lives in `weir-intake`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use weir_intake::claim::ClaimService;
use weir_intake::config::{ConfigStore, InMemoryConfigStore};
use weir_intake::dlq::DlqAdmin;
use weir_intake::ledger::{InMemoryLedger, LedgerClient};
use weir_intake::queue::{
    DeadLetterQueue, InMemoryDeadLetterQueue, InMemoryIntakeQueue, IntakeQueue,
};
use weir_intake::reaper::Reaper;
use weir_intake::slot::{InMemorySlotStore, SlotStore};
use weir_intake::webhook::{HttpWebhookDispatcher, WebhookDispatcher};
use weir_intake::worker::BridgeWorker;

use crate::config::Config;
use crate::metrics;
use crate::openapi::ApiDoc;
use crate::routes;
use utoipa::OpenApi;

/// Header used for request correlation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Slot inventory.
    pub slots: Arc<dyn SlotStore>,
    /// Intake queue.
    pub queue: Arc<dyn IntakeQueue>,
    /// Dead-letter queue.
    pub dead_letters: Arc<dyn DeadLetterQueue>,
    /// Per-pool config store.
    pub pool_configs: Arc<dyn ConfigStore>,
    /// Caller-facing claim service.
    pub claims: ClaimService,
    /// The bridge worker.
    pub worker: BridgeWorker,
    /// The orphan reaper.
    pub reaper: Reaper,
    /// DLQ admin operations.
    pub dlq_admin: DlqAdmin,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates application state over in-memory backends and the
    /// production webhook dispatcher.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let webhooks: Arc<dyn WebhookDispatcher> =
            Arc::new(HttpWebhookDispatcher::with_timeout(config.webhook_timeout()));
        let slots: Arc<dyn SlotStore> = Arc::new(InMemorySlotStore::new());
        let dead_letters: Arc<dyn DeadLetterQueue> = Arc::new(InMemoryDeadLetterQueue::new());
        let queue: Arc<dyn IntakeQueue> = Arc::new(InMemoryIntakeQueue::new(
            "intake_queue",
            Arc::clone(&dead_letters),
        ));
        let pool_configs: Arc<dyn ConfigStore> = Arc::new(InMemoryConfigStore::new());
        let ledger: Arc<dyn LedgerClient> = Arc::new(InMemoryLedger::new());

        Self::with_backends(
            config,
            slots,
            queue,
            dead_letters,
            pool_configs,
            ledger,
            webhooks,
        )
    }

    /// Creates application state over explicit backends (tests inject
    /// in-memory ledgers and scripted webhook dispatchers here).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_backends(
        config: Config,
        slots: Arc<dyn SlotStore>,
        queue: Arc<dyn IntakeQueue>,
        dead_letters: Arc<dyn DeadLetterQueue>,
        pool_configs: Arc<dyn ConfigStore>,
        ledger: Arc<dyn LedgerClient>,
        webhooks: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        let claims = ClaimService::new(Arc::clone(&slots), Arc::clone(&queue));
        let worker = BridgeWorker::new(
            Arc::clone(&queue),
            Arc::clone(&slots),
            Arc::clone(&pool_configs),
            ledger,
            webhooks,
        )
        .with_drain_budget(config.drain_budget());
        let reaper = Reaper::new(Arc::clone(&slots), Arc::clone(&queue))
            .with_threshold(config.reap_threshold());
        let dlq_admin = DlqAdmin::new(Arc::clone(&queue), Arc::clone(&dead_letters));

        Self {
            config,
            slots,
            queue,
            dead_letters,
            pool_configs,
            claims,
            worker,
            reaper,
            dlq_admin,
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. Shallow; verifies no
/// dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Probes the intake queue, the shared dependency every request path needs.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.queue.depth().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("intake queue unavailable: {e}")),
            }),
        ),
    }
}

/// Ensures every request carries a request id and echoes it on the
/// response.
async fn request_id_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| Ulid::new().to_string(), str::to_string);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Serves the OpenAPI document.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Builds the full application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .nest("/api/v1", routes::api_routes())
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The HTTP server.
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Creates a server over fresh in-memory backends.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }

    /// Creates a server over pre-built application state.
    #[must_use]
    pub fn with_state(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Returns the application state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Binds the HTTP listener and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound or the server fails.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let app = router(Arc::clone(&self.state));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "weir-api listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
