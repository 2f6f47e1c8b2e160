//! Caller-facing claim route.
//!
//! `POST /api/v1/pools/{pool_id}/claims` is the burst-facing surface: it
//! reserves one slot and enqueues the intent. A `null` resource id means
//! sold out or pool inactive, never an error.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use weir_core::observability::claim_span;
use weir_core::{PoolId, SlotId, UserId};
use weir_intake::config::ConfigStore;

use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Request body for a claim.
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct ClaimRequest {
    /// The user taking the claim.
    pub user_id: String,
}

/// Response body for a claim.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ClaimResponse {
    /// The reserved slot id; `null` when sold out or the pool is inactive.
    pub resource_id: Option<Uuid>,
}

/// Claims one slot in a pool.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{pool_id}/claims",
    params(
        ("pool_id" = String, Path, description = "Pool to claim from")
    ),
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Claim outcome; resource_id is null when sold out", body = ClaimResponse),
        (status = 400, description = "Invalid request", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    ),
    tag = "Claims"
)]
pub(crate) async fn claim(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }

    let pool = PoolId::new(pool_id);
    let user = UserId::new(request.user_id);

    // A deactivated pool reads as sold out; the claim primitive itself
    // stays config-free.
    if let Some(config) = state.pool_configs.get(&pool).await? {
        if !config.is_active {
            tracing::debug!(pool_id = %pool, "claim refused; pool deactivated");
            return Ok(Json(ClaimResponse { resource_id: None }));
        }
    }

    let span = claim_span("claim_resource_and_queue", pool.as_str(), user.as_str());
    let claimed = state
        .claims
        .claim_resource_and_queue(&pool, &user)
        .instrument(span)
        .await?;

    Ok(Json(ClaimResponse {
        resource_id: claimed.map(|id: SlotId| id.as_uuid()),
    }))
}

/// Creates the claim routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/pools/:pool_id/claims", post(claim))
}
