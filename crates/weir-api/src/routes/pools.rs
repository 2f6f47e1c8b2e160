//! Operator seeding routes.
//!
//! Elevated-credential surface for provisioning: seed slots into a pool,
//! read or replace its runtime config, and inspect its per-status counts.
//! Config and inventory are independent; either may exist first.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::http::HeaderMap;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use weir_core::PoolId;
use weir_intake::config::{ConfigStore, PoolConfig};
use weir_intake::slot::SlotStore;

use crate::auth::require_bearer;
use crate::error::{ApiError, ApiErrorBody};
use crate::server::AppState;

/// Request body for seeding slots.
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct CreateSlotsRequest {
    /// Number of AVAILABLE slots to insert.
    pub count: usize,
}

/// Response body for seeding slots.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct CreateSlotsResponse {
    /// Ids of the created slots.
    pub slot_ids: Vec<Uuid>,
}

/// Per-pool runtime config as carried by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolConfigBody {
    /// Messages drained per worker invocation.
    #[serde(default = "PoolConfigBody::default_batch_size")]
    pub batch_size: usize,
    /// Queue lease duration in seconds.
    #[serde(default = "PoolConfigBody::default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u32,
    /// Deliveries tolerated before a message is dead-lettered.
    #[serde(default = "PoolConfigBody::default_max_retries")]
    pub max_retries: u32,
    /// Deactivated pools have their intents dead-lettered on sight.
    #[serde(default = "PoolConfigBody::default_is_active")]
    pub is_active: bool,
    /// External validation endpoint; unset means validation is vacuous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_webhook_url: Option<String>,
    /// Ledger RPC used when no commit webhook is configured.
    #[serde(default = "PoolConfigBody::default_commit_rpc_name")]
    pub commit_rpc_name: String,
    /// Commit endpoint; set, it takes precedence over the ledger RPC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_webhook_url: Option<String>,
}

impl PoolConfigBody {
    fn default_batch_size() -> usize {
        PoolConfig::default().batch_size
    }

    fn default_visibility_timeout_secs() -> u32 {
        PoolConfig::default().visibility_timeout_secs
    }

    fn default_max_retries() -> u32 {
        PoolConfig::default().max_retries
    }

    fn default_is_active() -> bool {
        PoolConfig::default().is_active
    }

    fn default_commit_rpc_name() -> String {
        PoolConfig::default().commit_rpc_name
    }
}

impl From<PoolConfigBody> for PoolConfig {
    fn from(body: PoolConfigBody) -> Self {
        Self {
            batch_size: body.batch_size,
            visibility_timeout_secs: body.visibility_timeout_secs,
            max_retries: body.max_retries,
            is_active: body.is_active,
            validation_webhook_url: body.validation_webhook_url,
            commit_rpc_name: body.commit_rpc_name,
            commit_webhook_url: body.commit_webhook_url,
        }
    }
}

impl From<PoolConfig> for PoolConfigBody {
    fn from(config: PoolConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            visibility_timeout_secs: config.visibility_timeout_secs,
            max_retries: config.max_retries,
            is_active: config.is_active,
            validation_webhook_url: config.validation_webhook_url,
            commit_rpc_name: config.commit_rpc_name,
            commit_webhook_url: config.commit_webhook_url,
        }
    }
}

/// Per-status slot counts for one pool.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SlotSummaryResponse {
    /// Slots in `AVAILABLE`.
    pub available: usize,
    /// Slots in `RESERVED`.
    pub reserved: usize,
    /// Slots in `CONSUMED`.
    pub consumed: usize,
}

/// Seeds AVAILABLE slots into a pool.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{pool_id}/slots",
    params(
        ("pool_id" = String, Path, description = "Pool to seed")
    ),
    request_body = CreateSlotsRequest,
    responses(
        (status = 200, description = "Created slot ids", body = CreateSlotsResponse),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "Seeding",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn create_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pool_id): Path<String>,
    Json(request): Json<CreateSlotsRequest>,
) -> Result<Json<CreateSlotsResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let pool = PoolId::new(pool_id);
    let created = state.slots.create_slots(&pool, request.count).await?;
    tracing::info!(pool_id = %pool, count = created.len(), "seeded slots");

    Ok(Json(CreateSlotsResponse {
        slot_ids: created.into_iter().map(|id| id.as_uuid()).collect(),
    }))
}

/// Returns per-status counts for a pool.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_id}/slots",
    params(
        ("pool_id" = String, Path, description = "Pool to inspect")
    ),
    responses(
        (status = 200, description = "Per-status counts", body = SlotSummaryResponse),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "Seeding",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn slot_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pool_id): Path<String>,
) -> Result<Json<SlotSummaryResponse>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let counts = state
        .slots
        .count_by_status(&PoolId::new(pool_id))
        .await?;
    Ok(Json(SlotSummaryResponse {
        available: counts.available,
        reserved: counts.reserved,
        consumed: counts.consumed,
    }))
}

/// Creates or replaces a pool's config.
#[utoipa::path(
    put,
    path = "/api/v1/pools/{pool_id}/config",
    params(
        ("pool_id" = String, Path, description = "Pool to configure")
    ),
    request_body = PoolConfigBody,
    responses(
        (status = 200, description = "The stored config", body = PoolConfigBody),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "Seeding",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn put_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pool_id): Path<String>,
    Json(body): Json<PoolConfigBody>,
) -> Result<Json<PoolConfigBody>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let pool = PoolId::new(pool_id);
    let config: PoolConfig = body.into();
    state.pool_configs.upsert(&pool, config.clone()).await?;
    tracing::info!(pool_id = %pool, "pool config updated");

    Ok(Json(config.into()))
}

/// Fetches a pool's config.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_id}/config",
    params(
        ("pool_id" = String, Path, description = "Pool to read")
    ),
    responses(
        (status = 200, description = "The stored config", body = PoolConfigBody),
        (status = 404, description = "Pool has no config", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid admin credential", body = ApiErrorBody),
    ),
    tag = "Seeding",
    security(
        ("adminAuth" = [])
    )
)]
pub(crate) async fn get_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(pool_id): Path<String>,
) -> Result<Json<PoolConfigBody>, ApiError> {
    require_bearer(
        &headers,
        state.config.admin_token.as_deref(),
        state.config.debug,
    )?;

    let pool = PoolId::new(pool_id);
    let config = state
        .pool_configs
        .get(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no config for pool: {pool}")))?;
    Ok(Json(config.into()))
}

/// Creates the seeding routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pools/:pool_id/slots", post(create_slots).get(slot_summary))
        .route(
            "/pools/:pool_id/config",
            put(put_config).get(get_config),
        )
}
