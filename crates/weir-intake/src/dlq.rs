//! Dead-letter queue administration.
//!
//! Operator surface over the two-queue topology: inspect what was
//! dead-lettered, replay selected messages back into the intake queue, or
//! discard them for good. Replay re-sends the **original payload** with a
//! fresh envelope: the retry counter starts over, while the payload state
//! machine resumes wherever it stopped.

use std::sync::Arc;

use weir_core::{MsgId, PoolId};

use crate::error::Result;
use crate::message::DlqEnvelope;
use crate::queue::{DeadLetterQueue, IntakeQueue};

/// Admin operations over the intake queue / DLQ pair.
pub struct DlqAdmin {
    intake: Arc<dyn IntakeQueue>,
    dlq: Arc<dyn DeadLetterQueue>,
}

impl DlqAdmin {
    /// Creates an admin surface over the queue pair.
    #[must_use]
    pub fn new(intake: Arc<dyn IntakeQueue>, dlq: Arc<dyn DeadLetterQueue>) -> Self {
        Self { intake, dlq }
    }

    /// Lists dead-lettered messages, optionally filtered by pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the DLQ cannot be read.
    pub async fn list(&self, pool_id: Option<&PoolId>) -> Result<Vec<DlqEnvelope>> {
        self.dlq.list(pool_id).await
    }

    /// Re-sends the selected messages into the intake queue and deletes
    /// them from the DLQ. Returns the number replayed.
    ///
    /// Each message is re-sent before its DLQ copy is deleted, so a crash
    /// mid-replay can duplicate an intent but never lose one; duplicates
    /// converge through the idempotent commit.
    ///
    /// # Errors
    ///
    /// Returns an error on the first message that fails to re-send;
    /// messages already replayed stay replayed.
    pub async fn replay(&self, msg_ids: &[MsgId]) -> Result<usize> {
        let selected = self.dlq.fetch(msg_ids).await?;
        let mut replayed = 0;
        for envelope in &selected {
            let msg_id = self.intake.send(envelope.entry.payload.clone()).await?;
            self.dlq.delete(&[envelope.msg_id]).await?;
            replayed += 1;
            tracing::info!(
                dlq_msg_id = %envelope.msg_id,
                new_msg_id = %msg_id,
                reason = %envelope.entry.reason,
                "replayed dead-lettered message"
            );
        }
        Ok(replayed)
    }

    /// Permanently deletes the selected messages from the DLQ. Returns the
    /// number discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the DLQ delete fails.
    pub async fn discard(&self, msg_ids: &[MsgId]) -> Result<usize> {
        let discarded = self.dlq.delete(msg_ids).await?;
        if discarded > 0 {
            tracing::info!(discarded, "discarded dead-lettered messages");
        }
        Ok(discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DlqMessage, DlqReason, IntakeMessage, IntakeState};
    use crate::queue::{InMemoryDeadLetterQueue, InMemoryIntakeQueue};
    use chrono::Utc;
    use weir_core::{SlotId, UserId};

    fn fixtures() -> (
        DlqAdmin,
        Arc<InMemoryIntakeQueue>,
        Arc<InMemoryDeadLetterQueue>,
    ) {
        let dlq = Arc::new(InMemoryDeadLetterQueue::new());
        let intake = Arc::new(InMemoryIntakeQueue::new(
            "intake_queue",
            Arc::clone(&dlq) as _,
        ));
        let admin = DlqAdmin::new(Arc::clone(&intake) as _, Arc::clone(&dlq) as _);
        (admin, intake, dlq)
    }

    async fn dead_letter(dlq: &InMemoryDeadLetterQueue, state: IntakeState) -> Result<MsgId> {
        let message = IntakeMessage {
            pool_id: PoolId::new("p1"),
            resource_id: SlotId::generate(),
            user_id: UserId::new("u1"),
            state,
        };
        dlq.push(DlqMessage {
            original_msg_id: MsgId::new(1),
            final_read_ct: 11,
            routed_to_dlq_at: Utc::now(),
            reason: DlqReason::RetryExhausted,
            payload: message.to_payload()?,
        })
        .await
    }

    #[tokio::test]
    async fn replay_restarts_envelope_and_keeps_state() -> Result<()> {
        let (admin, intake, dlq) = fixtures();
        let id = dead_letter(&dlq, IntakeState::Validated).await?;

        assert_eq!(admin.replay(&[id]).await?, 1);
        assert_eq!(dlq.depth().await?, 0);
        assert_eq!(intake.depth().await?, 1);

        let snapshot = intake.snapshot()?;
        // Fresh envelope: the retry counter starts over.
        assert_eq!(snapshot[0].read_ct, 0);
        let replayed = IntakeMessage::from_payload(&snapshot[0].payload)?;
        // Payload state survives, so recovery resumes mid-machine.
        assert_eq!(replayed.state, IntakeState::Validated);
        Ok(())
    }

    #[tokio::test]
    async fn replay_unknown_ids_is_a_noop() -> Result<()> {
        let (admin, intake, _dlq) = fixtures();
        assert_eq!(admin.replay(&[MsgId::new(42)]).await?, 0);
        assert_eq!(intake.depth().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn discard_deletes_without_resend() -> Result<()> {
        let (admin, intake, dlq) = fixtures();
        let keep = dead_letter(&dlq, IntakeState::Queued).await?;
        let drop = dead_letter(&dlq, IntakeState::Queued).await?;

        assert_eq!(admin.discard(&[drop]).await?, 1);
        assert_eq!(dlq.depth().await?, 1);
        assert_eq!(intake.depth().await?, 0);

        let remaining = admin.list(None).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].msg_id, keep);
        Ok(())
    }
}
