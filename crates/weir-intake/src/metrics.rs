//! Observability metrics for the intake pipeline.
//!
//! Metrics are exported through the `metrics` crate facade; the API server
//! installs a Prometheus recorder and serves them at `/metrics`.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `weir_claims_total` | Counter | `outcome` | Claim attempts by outcome |
//! | `weir_drain_messages_total` | Counter | `disposition` | Messages per drain disposition |
//! | `weir_drain_duration_seconds` | Histogram | - | Wall time of one drain invocation |
//! | `weir_queue_depth` | Gauge | `queue` | Messages currently in a queue |
//! | `weir_reaped_slots_total` | Counter | - | Slots returned to AVAILABLE by the reaper |
//! | `weir_webhook_posts_total` | Counter | `kind`, `result` | Webhook dispatches by kind and result |

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: claim attempts by outcome.
    pub const CLAIMS_TOTAL: &str = "weir_claims_total";
    /// Counter: drained messages by disposition.
    pub const DRAIN_MESSAGES_TOTAL: &str = "weir_drain_messages_total";
    /// Histogram: drain invocation wall time in seconds.
    pub const DRAIN_DURATION_SECONDS: &str = "weir_drain_duration_seconds";
    /// Gauge: messages currently in a queue.
    pub const QUEUE_DEPTH: &str = "weir_queue_depth";
    /// Counter: slots returned to AVAILABLE by the reaper.
    pub const REAPED_SLOTS_TOTAL: &str = "weir_reaped_slots_total";
    /// Counter: webhook dispatches by kind and result.
    pub const WEBHOOK_POSTS_TOTAL: &str = "weir_webhook_posts_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Claim outcome (`reserved`, `sold_out`).
    pub const OUTCOME: &str = "outcome";
    /// Drain disposition (`processed`, `dead_lettered`, `deferred`).
    pub const DISPOSITION: &str = "disposition";
    /// Queue name (`intake_queue`, `intake_dlq`).
    pub const QUEUE: &str = "queue";
    /// Webhook kind (`validation`, `commit`).
    pub const KIND: &str = "kind";
    /// Webhook result (`accepted`, `rejected`, `unreachable`).
    pub const RESULT: &str = "result";
}

/// Metrics recorder for intake operations.
///
/// Thin facade over the `metrics` macros so call sites stay uniform.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeMetrics;

impl IntakeMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a claim attempt outcome.
    pub fn record_claim(&self, outcome: &'static str) {
        counter!(names::CLAIMS_TOTAL, labels::OUTCOME => outcome).increment(1);
    }

    /// Records the disposition of one drained message.
    pub fn record_disposition(&self, disposition: &'static str) {
        counter!(names::DRAIN_MESSAGES_TOTAL, labels::DISPOSITION => disposition).increment(1);
    }

    /// Records the wall time of one drain invocation.
    pub fn observe_drain_duration(&self, elapsed: Duration) {
        histogram!(names::DRAIN_DURATION_SECONDS).record(elapsed.as_secs_f64());
    }

    /// Updates the depth gauge for a queue.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_queue_depth(&self, queue: &'static str, depth: usize) {
        gauge!(names::QUEUE_DEPTH, labels::QUEUE => queue).set(depth as f64);
    }

    /// Records reaped slots.
    pub fn record_reaped(&self, count: usize) {
        counter!(names::REAPED_SLOTS_TOTAL).increment(count as u64);
    }

    /// Records a webhook dispatch.
    pub fn record_webhook(&self, kind: &'static str, result: &'static str) {
        counter!(names::WEBHOOK_POSTS_TOTAL, labels::KIND => kind, labels::RESULT => result)
            .increment(1);
    }
}
