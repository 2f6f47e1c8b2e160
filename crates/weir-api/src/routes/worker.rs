//! Bridge-worker trigger route.
//!
//! `POST /api/v1/worker/drain` is the idempotent entry point an external
//! scheduler hits on a cadence. It requires the worker bearer credential
//! and returns the structured drain summary. A queue-read failure maps to
//! 503; nothing was acknowledged, so the next invocation retries safely.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::require_bearer;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Response body for a drain invocation.
#[derive(Debug, Serialize, serde::Deserialize, ToSchema)]
pub struct DrainResponse {
    /// `"success"` when messages were leased, `"idle"` otherwise.
    pub status: String,
    /// Messages committed and acknowledged.
    pub processed: usize,
    /// Messages routed to the DLQ.
    pub dlq: usize,
    /// Messages leased in the batch.
    pub total: usize,
}

/// Runs one drain invocation.
#[utoipa::path(
    post,
    path = "/api/v1/worker/drain",
    responses(
        (status = 200, description = "Drain summary", body = DrainResponse),
        (status = 401, description = "Missing or invalid worker credential", body = ApiErrorBody),
        (status = 503, description = "Queue read failed; nothing acknowledged", body = ApiErrorBody),
    ),
    tag = "Worker",
    security(
        ("workerAuth" = [])
    )
)]
pub(crate) async fn drain(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DrainResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.worker_token.as_deref(),
        state.config.debug,
    )?;

    let summary = state.worker.drain_once().await?;
    let status = if summary.is_idle() { "idle" } else { "success" };

    Ok(Json(DrainResponse {
        status: status.to_string(),
        processed: summary.processed,
        dlq: summary.dlq,
        total: summary.total,
    }))
}

/// Creates the worker routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/worker/drain", post(drain))
}
