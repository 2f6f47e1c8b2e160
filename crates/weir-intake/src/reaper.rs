//! Orphan reaper for stale reservations.
//!
//! A reservation becomes an orphan when its intent is no longer live in the
//! intake queue: the claim/enqueue split failed, or the message was
//! dead-lettered. The reaper runs on its own cadence, probes the queue for
//! live `resource_id`s, and returns every sufficiently old orphaned
//! RESERVED slot to AVAILABLE.
//!
//! The threshold must sit comfortably above
//! `visibility_timeout × max_retries` so a legitimate long-running retry is
//! never raced. CONSUMED slots are never touched.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::metrics::IntakeMetrics;
use crate::queue::IntakeQueue;
use crate::slot::SlotStore;

/// Default orphan threshold.
///
/// Twenty times the default visibility timeout leaves ample headroom over
/// the default retry budget (45 s × 10).
pub const DEFAULT_ORPHAN_THRESHOLD: Duration = Duration::from_secs(900);

/// Periodic sweep that frees orphaned reservations.
pub struct Reaper {
    slots: Arc<dyn SlotStore>,
    queue: Arc<dyn IntakeQueue>,
    threshold: Duration,
    metrics: IntakeMetrics,
}

impl Reaper {
    /// Creates a reaper with the default orphan threshold.
    #[must_use]
    pub fn new(slots: Arc<dyn SlotStore>, queue: Arc<dyn IntakeQueue>) -> Self {
        Self {
            slots,
            queue,
            threshold: DEFAULT_ORPHAN_THRESHOLD,
            metrics: IntakeMetrics::new(),
        }
    }

    /// Overrides the orphan threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Runs one sweep. Returns the number of slots reaped.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue probe or the slot store fails; the
    /// next scheduled sweep retries.
    pub async fn reap_once(&self) -> Result<usize> {
        let live = self.queue.live_resource_ids().await?;
        let reaped = self.slots.reap_orphans(self.threshold, &live).await?;

        if reaped > 0 {
            self.metrics.record_reaped(reaped);
            tracing::info!(reaped, "returned orphaned reservations to available");
        } else {
            tracing::debug!("no orphaned reservations found");
        }
        Ok(reaped)
    }
}
