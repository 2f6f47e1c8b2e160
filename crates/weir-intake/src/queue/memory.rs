//! In-memory queue implementations.
//!
//! This module provides [`InMemoryIntakeQueue`] and
//! [`InMemoryDeadLetterQueue`], process-local implementations of the queue
//! traits.
//!
//! ## Limitations
//!
//! - **Single-process only**: messages are not visible across process
//!   boundaries
//! - **No durability**: the production deployment puts a persistent queue
//!   behind the same traits; tests and the debug posture use these

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use weir_core::{MsgId, PoolId, SlotId};

use super::{DeadLetterQueue, IntakeQueue};
use crate::error::{Error, Result};
use crate::message::{DlqEnvelope, DlqMessage, DlqReason, MessageEnvelope};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("queue lock poisoned")
}

#[derive(Debug, Clone)]
struct StoredMessage {
    read_ct: u32,
    enqueued_at: DateTime<Utc>,
    /// Visibility deadline; the message is leased while this is in the
    /// future.
    vt: DateTime<Utc>,
    payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct QueueState {
    next_msg_id: u64,
    /// Keyed by raw msg id; BTreeMap iteration preserves enqueue order.
    messages: BTreeMap<u64, StoredMessage>,
}

/// In-memory intake queue with visibility-timeout leasing.
///
/// Constructed over the DLQ it dead-letters into, so `move_to_dlq` is one
/// call site.
pub struct InMemoryIntakeQueue {
    name: String,
    dlq: Arc<dyn DeadLetterQueue>,
    inner: Mutex<QueueState>,
}

impl std::fmt::Debug for InMemoryIntakeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIntakeQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl InMemoryIntakeQueue {
    /// Creates an intake queue that dead-letters into `dlq`.
    #[must_use]
    pub fn new(name: impl Into<String>, dlq: Arc<dyn DeadLetterQueue>) -> Self {
        Self {
            name: name.into(),
            dlq,
            inner: Mutex::new(QueueState::default()),
        }
    }

    /// Returns the queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expires every outstanding lease, making all messages visible now.
    ///
    /// Test helper: stands in for waiting out a visibility timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn release_leases(&self) -> Result<()> {
        let now = Utc::now();
        let mut state = self.inner.lock().map_err(poison_err)?;
        for stored in state.messages.values_mut() {
            stored.vt = now;
        }
        Ok(())
    }

    /// Returns every message with its current envelope, leased or not.
    ///
    /// Inspection helper for tests and operator tooling; does not lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<MessageEnvelope>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state
            .messages
            .iter()
            .map(|(id, stored)| MessageEnvelope {
                msg_id: MsgId::new(*id),
                read_ct: stored.read_ct,
                enqueued_at: stored.enqueued_at,
                vt: stored.vt,
                payload: stored.payload.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl IntakeQueue for InMemoryIntakeQueue {
    async fn send(&self, payload: serde_json::Value) -> Result<MsgId> {
        let now = Utc::now();
        let mut state = self.inner.lock().map_err(poison_err)?;
        state.next_msg_id += 1;
        let id = state.next_msg_id;
        state.messages.insert(
            id,
            StoredMessage {
                read_ct: 0,
                enqueued_at: now,
                vt: now,
                payload,
            },
        );
        Ok(MsgId::new(id))
    }

    async fn read(
        &self,
        visibility_timeout: Duration,
        max_count: usize,
    ) -> Result<Vec<MessageEnvelope>> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(visibility_timeout)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let mut state = self.inner.lock().map_err(poison_err)?;
        let mut batch = Vec::new();
        for (id, stored) in &mut state.messages {
            if batch.len() >= max_count {
                break;
            }
            if stored.vt > now {
                continue;
            }
            stored.vt = now + lease;
            stored.read_ct += 1;
            batch.push(MessageEnvelope {
                msg_id: MsgId::new(*id),
                read_ct: stored.read_ct,
                enqueued_at: stored.enqueued_at,
                vt: stored.vt,
                payload: stored.payload.clone(),
            });
        }
        Ok(batch)
    }

    async fn delete(&self, msg_ids: &[MsgId]) -> Result<usize> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        let mut removed = 0;
        for id in msg_ids {
            if state.messages.remove(&id.value()).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn update_payload(&self, msg_id: MsgId, payload: serde_json::Value) -> Result<bool> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        match state.messages.get_mut(&msg_id.value()) {
            Some(stored) => {
                stored.payload = payload;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn move_to_dlq(
        &self,
        msg_id: MsgId,
        payload: serde_json::Value,
        read_ct: u32,
        reason: DlqReason,
    ) -> Result<()> {
        // DLQ first: if the push fails the source message stays leased and
        // simply redelivers later.
        self.dlq
            .push(DlqMessage {
                original_msg_id: msg_id,
                final_read_ct: read_ct,
                routed_to_dlq_at: Utc::now(),
                reason,
                payload,
            })
            .await?;
        self.delete(&[msg_id]).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<usize> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state.messages.len())
    }

    async fn live_resource_ids(&self) -> Result<HashSet<SlotId>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state
            .messages
            .values()
            .filter_map(|stored| {
                stored
                    .payload
                    .get("resource_id")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|raw| SlotId::from_str(raw).ok())
            })
            .collect())
    }
}

/// In-memory dead-letter queue.
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterQueue {
    inner: Mutex<DlqState>,
}

#[derive(Debug, Default)]
struct DlqState {
    next_msg_id: u64,
    messages: BTreeMap<u64, DlqMessage>,
}

impl InMemoryDeadLetterQueue {
    /// Creates an empty DLQ.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetterQueue {
    async fn push(&self, dead: DlqMessage) -> Result<MsgId> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        state.next_msg_id += 1;
        let id = state.next_msg_id;
        state.messages.insert(id, dead);
        Ok(MsgId::new(id))
    }

    async fn list(&self, pool_id: Option<&PoolId>) -> Result<Vec<DlqEnvelope>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state
            .messages
            .iter()
            .filter(|(_, entry)| match pool_id {
                Some(wanted) => entry.pool_id().as_ref() == Some(wanted),
                None => true,
            })
            .map(|(id, entry)| DlqEnvelope {
                msg_id: MsgId::new(*id),
                entry: entry.clone(),
            })
            .collect())
    }

    async fn fetch(&self, msg_ids: &[MsgId]) -> Result<Vec<DlqEnvelope>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(msg_ids
            .iter()
            .filter_map(|id| {
                state.messages.get(&id.value()).map(|entry| DlqEnvelope {
                    msg_id: *id,
                    entry: entry.clone(),
                })
            })
            .collect())
    }

    async fn delete(&self, msg_ids: &[MsgId]) -> Result<usize> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        let mut removed = 0;
        for id in msg_ids {
            if state.messages.remove(&id.value()).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn depth(&self) -> Result<usize> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{IntakeMessage, IntakeState};
    use weir_core::UserId;

    fn queue_pair() -> (InMemoryIntakeQueue, Arc<InMemoryDeadLetterQueue>) {
        let dlq = Arc::new(InMemoryDeadLetterQueue::new());
        let queue = InMemoryIntakeQueue::new("intake_queue", Arc::clone(&dlq) as _);
        (queue, dlq)
    }

    fn payload(resource_id: SlotId) -> serde_json::Value {
        IntakeMessage {
            pool_id: PoolId::new("p1"),
            resource_id,
            user_id: UserId::new("u1"),
            state: IntakeState::Queued,
        }
        .to_payload()
        .unwrap()
    }

    #[tokio::test]
    async fn msg_ids_are_monotone() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        let a = queue.send(payload(SlotId::generate())).await?;
        let b = queue.send(payload(SlotId::generate())).await?;
        assert!(a < b);
        Ok(())
    }

    #[tokio::test]
    async fn read_leases_and_counts_deliveries() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        queue.send(payload(SlotId::generate())).await?;

        let batch = queue.read(Duration::from_secs(30), 10).await?;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].read_ct, 1);

        // Leased: a second read sees nothing.
        let again = queue.read(Duration::from_secs(30), 10).await?;
        assert!(again.is_empty());

        // Depth counts leased messages.
        assert_eq!(queue.depth().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_lease_redelivers_with_bumped_read_ct() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        queue.send(payload(SlotId::generate())).await?;

        let first = queue.read(Duration::from_secs(30), 10).await?;
        assert_eq!(first[0].read_ct, 1);

        queue.release_leases()?;
        let second = queue.read(Duration::from_secs(30), 10).await?;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].read_ct, 2);
        assert_eq!(second[0].msg_id, first[0].msg_id);
        Ok(())
    }

    #[tokio::test]
    async fn read_respects_max_count() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        for _ in 0..5 {
            queue.send(payload(SlotId::generate())).await?;
        }
        let batch = queue.read(Duration::from_secs(30), 3).await?;
        assert_eq!(batch.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn empty_queue_reads_empty_batch() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        let batch = queue.read(Duration::from_secs(30), 10).await?;
        assert!(batch.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_readers_lease_disjoint_batches() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        for _ in 0..4 {
            queue.send(payload(SlotId::generate())).await?;
        }

        let first = queue.read(Duration::from_secs(30), 2).await?;
        let second = queue.read(Duration::from_secs(30), 2).await?;

        let mut ids: Vec<_> = first
            .iter()
            .chain(second.iter())
            .map(|e| e.msg_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_messages() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        let a = queue.send(payload(SlotId::generate())).await?;
        let b = queue.send(payload(SlotId::generate())).await?;

        let removed = queue.delete(&[a, b, MsgId::new(999)]).await?;
        assert_eq!(removed, 2);
        assert_eq!(queue.depth().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn update_payload_preserves_envelope() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        let resource_id = SlotId::generate();
        let id = queue.send(payload(resource_id)).await?;
        let leased = queue.read(Duration::from_secs(30), 1).await?;

        let mut message = IntakeMessage::from_payload(&leased[0].payload)?;
        message.state = IntakeState::Validated;
        assert!(queue.update_payload(id, message.to_payload()?).await?);

        let snapshot = queue.snapshot()?;
        assert_eq!(snapshot.len(), 1);
        // read_ct survives the payload swap.
        assert_eq!(snapshot[0].read_ct, 1);
        let stored = IntakeMessage::from_payload(&snapshot[0].payload)?;
        assert_eq!(stored.state, IntakeState::Validated);

        // Updating a deleted message reports false.
        queue.delete(&[id]).await?;
        assert!(!queue.update_payload(id, message.to_payload()?).await?);
        Ok(())
    }

    #[tokio::test]
    async fn move_to_dlq_is_one_logical_operation() -> Result<()> {
        let (queue, dlq) = queue_pair();
        let resource_id = SlotId::generate();
        let id = queue.send(payload(resource_id)).await?;
        let leased = queue.read(Duration::from_secs(30), 1).await?;

        queue
            .move_to_dlq(
                id,
                leased[0].payload.clone(),
                leased[0].read_ct,
                DlqReason::RetryExhausted,
            )
            .await?;

        assert_eq!(queue.depth().await?, 0);
        let dead = dlq.list(None).await?;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].entry.original_msg_id, id);
        assert_eq!(dead[0].entry.final_read_ct, 1);
        assert_eq!(dead[0].entry.reason, DlqReason::RetryExhausted);
        Ok(())
    }

    #[tokio::test]
    async fn live_resource_ids_reflect_queue_contents() -> Result<()> {
        let (queue, _dlq) = queue_pair();
        let a = SlotId::generate();
        let b = SlotId::generate();
        queue.send(payload(a)).await?;
        let msg_b = queue.send(payload(b)).await?;
        // A payload without a resource id contributes nothing.
        queue.send(serde_json::json!({"state": "queued"})).await?;

        let live = queue.live_resource_ids().await?;
        assert!(live.contains(&a));
        assert!(live.contains(&b));
        assert_eq!(live.len(), 2);

        queue.delete(&[msg_b]).await?;
        let live = queue.live_resource_ids().await?;
        assert!(!live.contains(&b));
        Ok(())
    }

    #[tokio::test]
    async fn dlq_list_filters_by_pool() -> Result<()> {
        let dlq = InMemoryDeadLetterQueue::new();
        let in_p1 = IntakeMessage {
            pool_id: PoolId::new("p1"),
            resource_id: SlotId::generate(),
            user_id: UserId::new("u1"),
            state: IntakeState::Queued,
        };
        let in_p2 = IntakeMessage {
            pool_id: PoolId::new("p2"),
            ..in_p1.clone()
        };

        for message in [&in_p1, &in_p2] {
            dlq.push(DlqMessage {
                original_msg_id: MsgId::new(1),
                final_read_ct: 1,
                routed_to_dlq_at: Utc::now(),
                reason: DlqReason::MissingConfig,
                payload: message.to_payload().unwrap(),
            })
            .await?;
        }

        assert_eq!(dlq.list(None).await?.len(), 2);
        let filtered = dlq.list(Some(&PoolId::new("p1"))).await?;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].entry.pool_id(), Some(PoolId::new("p1")));
        Ok(())
    }

    #[tokio::test]
    async fn dlq_fetch_and_delete() -> Result<()> {
        let dlq = InMemoryDeadLetterQueue::new();
        let id = dlq
            .push(DlqMessage {
                original_msg_id: MsgId::new(5),
                final_read_ct: 2,
                routed_to_dlq_at: Utc::now(),
                reason: DlqReason::InactivePool,
                payload: serde_json::json!({}),
            })
            .await?;

        let fetched = dlq.fetch(&[id]).await?;
        assert_eq!(fetched.len(), 1);
        assert_eq!(dlq.depth().await?, 1);

        assert_eq!(dlq.delete(&[id]).await?, 1);
        assert_eq!(dlq.depth().await?, 0);
        assert!(dlq.fetch(&[id]).await?.is_empty());
        Ok(())
    }
}
