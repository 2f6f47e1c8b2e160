//! # weir-api
//!
//! HTTP composition layer for the Weir burst-to-queue intake pipeline.
//!
//! This crate provides the API surface for Weir, handling:
//!
//! - **Claims**: the caller-facing claim endpoint
//! - **Worker trigger**: the idempotent drain entry point for an external
//!   scheduler
//! - **Administration**: DLQ inspection/replay/discard and operator seeding
//! - **Observability**: request metrics, tracing, health checks, `/metrics`
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer** with no domain policy.
//! All claim, drain, and reap logic lives in `weir-intake`.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /health                        - Health check
//! GET  /ready                         - Readiness check
//! GET  /metrics                       - Prometheus exposition
//! POST /api/v1/pools/{pool}/claims    - Claim one slot
//! POST /api/v1/worker/drain           - Drain one batch (worker bearer)
//! GET  /api/v1/dlq                    - List dead letters (admin bearer)
//! POST /api/v1/dlq/replay             - Replay dead letters (admin bearer)
//! POST /api/v1/dlq/discard            - Discard dead letters (admin bearer)
//! POST /api/v1/pools/{pool}/slots     - Seed inventory (admin bearer)
//! GET  /api/v1/pools/{pool}/slots     - Per-status counts (admin bearer)
//! PUT  /api/v1/pools/{pool}/config    - Upsert pool config (admin bearer)
//! GET  /api/v1/pools/{pool}/config    - Read pool config (admin bearer)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::{AppState, Server};
}
