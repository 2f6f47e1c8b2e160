//! Observability bootstrap for Weir services.
//!
//! Structured logging with consistent spans across the claim path, the
//! bridge worker, and the reaper. Services call [`init_logging`] once at
//! startup; the span helpers keep field names uniform so log queries work
//! the same across components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at service startup. Safe to call multiple times; subsequent
/// calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `weir_intake=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for claim-path operations.
#[must_use]
pub fn claim_span(operation: &str, pool_id: &str, user_id: &str) -> Span {
    tracing::info_span!(
        "claim",
        op = operation,
        pool_id = pool_id,
        user_id = user_id,
    )
}

/// Creates a span for a bridge-worker drain invocation.
///
/// # Example
///
/// ```rust
/// use weir_core::observability::drain_span;
///
/// let span = drain_span("drain_once", 25);
/// let _guard = span.enter();
/// // ... process the batch
/// ```
#[must_use]
pub fn drain_span(operation: &str, batch_size: usize) -> Span {
    tracing::info_span!("drain", op = operation, batch_size = batch_size)
}
