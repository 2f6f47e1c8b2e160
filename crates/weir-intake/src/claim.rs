//! The composite claim operation.
//!
//! `claim_resource_and_queue` is the single caller-facing primitive of the
//! intake side: reserve one slot, then enqueue the intent that carries its
//! id. The two steps are **deliberately not transactional** across the slot
//! store and the queue: if the enqueue fails after the reserve succeeded,
//! the slot is left RESERVED with no matching message and the reaper returns
//! it to AVAILABLE once the orphan threshold elapses. The system trades a
//! bounded transient dip in availability for full independence between the
//! two stores.

use std::sync::Arc;

use weir_core::{PoolId, SlotId, UserId};

use crate::error::Result;
use crate::message::IntakeMessage;
use crate::metrics::IntakeMetrics;
use crate::queue::IntakeQueue;
use crate::slot::SlotStore;

/// Caller-facing claim service over the slot store and the intake queue.
pub struct ClaimService {
    slots: Arc<dyn SlotStore>,
    queue: Arc<dyn IntakeQueue>,
    metrics: IntakeMetrics,
}

impl ClaimService {
    /// Creates a claim service over the given backends.
    #[must_use]
    pub fn new(slots: Arc<dyn SlotStore>, queue: Arc<dyn IntakeQueue>) -> Self {
        Self {
            slots,
            queue,
            metrics: IntakeMetrics::new(),
        }
    }

    /// Atomically reserves one slot in `pool_id` and enqueues the intent.
    ///
    /// Returns the reserved slot id, or `None` when the pool is sold out.
    /// Sold-out is never an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the enqueue fails after the reserve succeeded;
    /// the slot stays RESERVED and the reaper is the backstop that frees it.
    pub async fn claim_resource_and_queue(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
    ) -> Result<Option<SlotId>> {
        let Some(slot_id) = self.slots.claim_one(pool_id, user_id).await? else {
            self.metrics.record_claim("sold_out");
            tracing::debug!(pool_id = %pool_id, user_id = %user_id, "pool sold out");
            return Ok(None);
        };

        let message = IntakeMessage::queued(pool_id.clone(), slot_id, user_id.clone());
        match self.queue.send(message.to_payload()?).await {
            Ok(msg_id) => {
                self.metrics.record_claim("reserved");
                tracing::info!(
                    pool_id = %pool_id,
                    user_id = %user_id,
                    resource_id = %slot_id,
                    msg_id = %msg_id,
                    "slot reserved and intent queued"
                );
                Ok(Some(slot_id))
            }
            Err(err) => {
                tracing::warn!(
                    pool_id = %pool_id,
                    resource_id = %slot_id,
                    error = %err,
                    "intent enqueue failed after reserve; slot left for the reaper"
                );
                Err(err)
            }
        }
    }
}
