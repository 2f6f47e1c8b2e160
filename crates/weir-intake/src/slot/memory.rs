//! In-memory slot store implementation.
//!
//! This module provides [`InMemorySlotStore`], an implementation of the
//! [`SlotStore`] trait backed by process memory.
//!
//! ## Contention model
//!
//! The claim fast path needs "find some AVAILABLE row in pool P while
//! skipping locked rows" to be constant-time per attempt. The in-memory
//! rendition of that partial index is a per-pool deque of AVAILABLE slot
//! ids: `claim_one` pops one id and flips the row inside a single short
//! critical section with no await point, so concurrent claimers contend
//! only on the pop itself and never observe each other's in-flight work.
//!
//! ## Limitations
//!
//! - **Single-process only**: slot state is not shared across processes
//! - **Ephemeral durability**: a crash loses in-flight inventory, which the
//!   persisted-state layout explicitly permits for the slot table

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use weir_core::{PoolId, SlotId, UserId};

use super::{Slot, SlotStatus, SlotStore, StatusCounts};
use crate::error::{Error, Result};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("slot store lock poisoned")
}

#[derive(Debug, Default)]
struct SlotState {
    slots: HashMap<SlotId, Slot>,
    /// Partial index: AVAILABLE slot ids per pool, in creation order.
    available: HashMap<PoolId, VecDeque<SlotId>>,
}

/// In-memory slot store.
///
/// ## Example
///
/// ```rust,no_run
/// use weir_intake::slot::{InMemorySlotStore, SlotStore};
/// use weir_core::{PoolId, UserId};
///
/// # async fn demo() -> weir_intake::error::Result<()> {
/// let store = InMemorySlotStore::new();
/// store.create_slots(&PoolId::new("p1"), 3).await?;
/// let claimed = store.claim_one(&PoolId::new("p1"), &UserId::new("u1")).await?;
/// assert!(claimed.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    inner: Mutex<SlotState>,
}

impl InMemorySlotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every slot in a pool, in no particular order.
    ///
    /// Inspection helper for tests and operator tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self, pool_id: &PoolId) -> Result<Vec<Slot>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state
            .slots
            .values()
            .filter(|slot| &slot.pool_id == pool_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn create_slots(&self, pool_id: &PoolId, n: usize) -> Result<Vec<SlotId>> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        let mut created = Vec::with_capacity(n);
        for _ in 0..n {
            let id = SlotId::generate();
            state.slots.insert(
                id,
                Slot {
                    id,
                    pool_id: pool_id.clone(),
                    status: SlotStatus::Available,
                    locked_by: None,
                    locked_at: None,
                },
            );
            state
                .available
                .entry(pool_id.clone())
                .or_default()
                .push_back(id);
            created.push(id);
        }
        Ok(created)
    }

    async fn claim_one(&self, pool_id: &PoolId, user_id: &UserId) -> Result<Option<SlotId>> {
        let mut state = self.inner.lock().map_err(poison_err)?;

        let Some(id) = state
            .available
            .get_mut(pool_id)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };

        let Some(slot) = state.slots.get_mut(&id) else {
            // Index entry without a row would be a bookkeeping bug.
            return Err(Error::storage(format!(
                "available index references missing slot {id}"
            )));
        };

        slot.status = SlotStatus::Reserved;
        slot.locked_by = Some(user_id.clone());
        slot.locked_at = Some(Utc::now());
        Ok(Some(id))
    }

    async fn mark_consumed(&self, slot_id: SlotId) -> Result<bool> {
        let mut state = self.inner.lock().map_err(poison_err)?;
        let Some(slot) = state.slots.get_mut(&slot_id) else {
            return Ok(false);
        };
        if slot.status != SlotStatus::Reserved {
            return Ok(false);
        }
        // locked_by/locked_at are retained on consume.
        slot.status = SlotStatus::Consumed;
        Ok(true)
    }

    async fn reap_orphans(
        &self,
        threshold: Duration,
        live_intents: &HashSet<SlotId>,
    ) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::zero());

        let mut state = self.inner.lock().map_err(poison_err)?;
        let mut reaped = Vec::new();

        for slot in state.slots.values_mut() {
            if slot.status != SlotStatus::Reserved {
                continue;
            }
            let Some(locked_at) = slot.locked_at else {
                continue;
            };
            if locked_at >= cutoff || live_intents.contains(&slot.id) {
                continue;
            }
            slot.status = SlotStatus::Available;
            slot.locked_by = None;
            slot.locked_at = None;
            reaped.push((slot.pool_id.clone(), slot.id));
        }

        for (pool_id, id) in &reaped {
            state
                .available
                .entry(pool_id.clone())
                .or_default()
                .push_back(*id);
        }

        Ok(reaped.len())
    }

    async fn get(&self, slot_id: SlotId) -> Result<Option<Slot>> {
        let state = self.inner.lock().map_err(poison_err)?;
        Ok(state.slots.get(&slot_id).cloned())
    }

    async fn count_by_status(&self, pool_id: &PoolId) -> Result<StatusCounts> {
        let state = self.inner.lock().map_err(poison_err)?;
        let mut counts = StatusCounts::default();
        for slot in state.slots.values() {
            if &slot.pool_id != pool_id {
                continue;
            }
            match slot.status {
                SlotStatus::Available => counts.available += 1,
                SlotStatus::Reserved => counts.reserved += 1,
                SlotStatus::Consumed => counts.consumed += 1,
            }
        }
        Ok(counts)
    }
}
