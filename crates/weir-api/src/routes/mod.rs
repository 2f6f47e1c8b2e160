//! Versioned API routes.
//!
//! Each module owns one surface and exposes a `routes()` function; this
//! module merges them under `/api/v1`.
//!
//! | Surface | Routes | Credential |
//! |---|---|---|
//! | Claims | `POST /pools/{pool_id}/claims` | none |
//! | Worker | `POST /worker/drain` | worker bearer |
//! | DLQ admin | `GET /dlq`, `POST /dlq/replay`, `POST /dlq/discard` | admin bearer |
//! | Seeding | `POST /pools/{pool_id}/slots`, `GET/PUT /pools/{pool_id}/config`, `GET /pools/{pool_id}/slots` | admin bearer |

pub mod claims;
pub mod dlq;
pub mod pools;
pub mod worker;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Assembles all `/api/v1` routes.
#[must_use]
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(claims::routes())
        .merge(worker::routes())
        .merge(dlq::routes())
        .merge(pools::routes())
}
