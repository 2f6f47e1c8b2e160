//! Dead-letter queue admin routes.
//!
//! Elevated-credential surface over the DLQ: list what was dead-lettered,
//! replay selected messages back into the intake queue, or discard them.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use weir_core::{MsgId, PoolId};
use weir_intake::message::DlqEnvelope;

use crate::auth::require_bearer;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Query parameters for the DLQ listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct DlqListParams {
    /// Restrict the listing to one pool.
    pub pool_id: Option<String>,
}

/// One dead-lettered message as rendered by the admin API.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DlqMessageView {
    /// DLQ-local message id; the handle for replay/discard.
    pub msg_id: u64,
    /// The message's id in the intake queue at routing time.
    pub original_msg_id: u64,
    /// Delivery count at routing time.
    pub final_read_ct: u32,
    /// When the message was routed to the DLQ.
    pub routed_to_dlq_at: DateTime<Utc>,
    /// Why it was routed.
    pub reason: String,
    /// The original payload, verbatim.
    pub payload: serde_json::Value,
}

impl From<DlqEnvelope> for DlqMessageView {
    fn from(envelope: DlqEnvelope) -> Self {
        Self {
            msg_id: envelope.msg_id.value(),
            original_msg_id: envelope.entry.original_msg_id.value(),
            final_read_ct: envelope.entry.final_read_ct,
            routed_to_dlq_at: envelope.entry.routed_to_dlq_at,
            reason: envelope.entry.reason.to_string(),
            payload: envelope.entry.payload,
        }
    }
}

/// Response body for the DLQ listing.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DlqListResponse {
    /// Dead-lettered messages, oldest first.
    pub messages: Vec<DlqMessageView>,
}

/// Request body selecting DLQ messages by id.
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct DlqSelection {
    /// DLQ-local message ids.
    pub msg_ids: Vec<u64>,
}

/// Response body for a replay request.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ReplayResponse {
    /// Messages re-sent into the intake queue.
    pub replayed: usize,
}

/// Response body for a discard request.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DiscardResponse {
    /// Messages permanently deleted.
    pub discarded: usize,
}

fn selected_ids(selection: &DlqSelection) -> Vec<MsgId> {
    selection.msg_ids.iter().copied().map(MsgId::new).collect()
}

/// Lists dead-lettered messages.
#[utoipa::path(
    get,
    path = "/api/v1/dlq",
    params(DlqListParams),
    responses(
        (status = 200, description = "Dead-lettered messages", body = DlqListResponse),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "DLQ Admin",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<DlqListParams>,
) -> Result<Json<DlqListResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let pool = params.pool_id.map(PoolId::from);
    let messages = state
        .dlq_admin
        .list(pool.as_ref())
        .await?
        .into_iter()
        .map(DlqMessageView::from)
        .collect();

    Ok(Json(DlqListResponse { messages }))
}

/// Replays selected messages back into the intake queue.
#[utoipa::path(
    post,
    path = "/api/v1/dlq/replay",
    request_body = DlqSelection,
    responses(
        (status = 200, description = "Replay outcome", body = ReplayResponse),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "DLQ Admin",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn replay(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(selection): Json<DlqSelection>,
) -> Result<Json<ReplayResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let replayed = state.dlq_admin.replay(&selected_ids(&selection)).await?;
    Ok(Json(ReplayResponse { replayed }))
}

/// Permanently discards selected messages.
#[utoipa::path(
    post,
    path = "/api/v1/dlq/discard",
    request_body = DlqSelection,
    responses(
        (status = 200, description = "Discard outcome", body = DiscardResponse),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "DLQ Admin",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn discard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(selection): Json<DlqSelection>,
) -> Result<Json<DiscardResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let discarded = state.dlq_admin.discard(&selected_ids(&selection)).await?;
    Ok(Json(DiscardResponse { discarded }))
}

/// Creates the DLQ admin routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dlq", get(list))
        .route("/dlq/replay", post(replay))
        .route("/dlq/discard", post(discard))
}
