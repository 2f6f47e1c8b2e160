//! Slot inventory abstraction.
//!
//! This module provides:
//!
//! - [`Slot`]: one unit of inventory with a three-state lifecycle
//! - [`SlotStore`]: trait for bounded pools with a contention-skipping claim
//! - [`InMemorySlotStore`]: in-memory implementation
//!
//! ## Lifecycle
//!
//! ```text
//! AVAILABLE ──claim_one──▶ RESERVED ──mark_consumed──▶ CONSUMED (terminal)
//!     ▲                       │
//!     └──────reap_orphans─────┘   (stale, no live intent)
//! ```
//!
//! ## Design Principles
//!
//! - **Contention-free claims**: `claim_one` must never block on another
//!   caller's in-flight claim and never hand the same slot to two callers
//! - **Conditional consume**: `mark_consumed` only transitions RESERVED
//!   rows; anything else is a no-op, so redeliveries and reaper races are
//!   harmless

pub mod memory;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weir_core::{PoolId, SlotId, UserId};

use crate::error::Result;

pub use memory::InMemorySlotStore;

/// The lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    /// Free inventory, eligible for `claim_one`.
    Available,
    /// Held by a user with an in-flight (or orphaned) intent.
    Reserved,
    /// Confirmed in the ledger. Terminal.
    Consumed,
}

/// A single unit of inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Globally unique, immutable identifier.
    pub id: SlotId,
    /// Pool this slot belongs to.
    pub pool_id: PoolId,
    /// Current lifecycle state.
    pub status: SlotStatus,
    /// User holding the reservation; set on reserve, retained on consume,
    /// cleared on reap.
    pub locked_by: Option<UserId>,
    /// When the reservation was taken; same retention as `locked_by`.
    pub locked_at: Option<DateTime<Utc>>,
}

/// Per-status slot counts for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Slots in `AVAILABLE`.
    pub available: usize,
    /// Slots in `RESERVED`.
    pub reserved: usize,
    /// Slots in `CONSUMED`.
    pub consumed: usize,
}

impl StatusCounts {
    /// Total slots across all states.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.available + self.reserved + self.consumed
    }
}

/// Bounded pool of unique slots with a contention-skipping claim primitive.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; `claim_one` in particular must be safe to
/// execute concurrently from arbitrarily many callers. Ordering among
/// concurrent callers is unspecified.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Inserts `n` fresh AVAILABLE slots into `pool_id` (operator path).
    ///
    /// Returns the generated ids.
    async fn create_slots(&self, pool_id: &PoolId, n: usize) -> Result<Vec<SlotId>>;

    /// Atomically reserves one AVAILABLE slot in `pool_id` for `user_id`.
    ///
    /// Selects any single unlocked AVAILABLE row, skipping rows another
    /// in-flight claim holds, and sets it RESERVED with the caller's user id
    /// and the current timestamp. Tie-break among candidates is
    /// implementation-defined.
    ///
    /// Returns `None` when no unlocked AVAILABLE slot exists (sold out).
    /// Sold-out is never an error.
    async fn claim_one(&self, pool_id: &PoolId, user_id: &UserId) -> Result<Option<SlotId>>;

    /// Conditionally transitions a slot RESERVED → CONSUMED.
    ///
    /// Returns `true` if the transition happened. A slot that is not
    /// currently RESERVED is left untouched and `false` is returned; a
    /// concurrent reaper or a prior successful attempt already handled it.
    async fn mark_consumed(&self, slot_id: SlotId) -> Result<bool>;

    /// Returns to AVAILABLE every slot that is RESERVED, was locked before
    /// `now - threshold`, and has no matching id in `live_intents` (the set
    /// of resource ids with live messages in the intake queue).
    ///
    /// Clears `locked_by` and `locked_at` on each reaped slot. CONSUMED
    /// slots are never touched. Returns the count reaped.
    async fn reap_orphans(
        &self,
        threshold: Duration,
        live_intents: &HashSet<SlotId>,
    ) -> Result<usize>;

    /// Fetches a slot by id.
    async fn get(&self, slot_id: SlotId) -> Result<Option<Slot>>;

    /// Returns per-status counts for one pool.
    async fn count_by_status(&self, pool_id: &PoolId) -> Result<StatusCounts>;
}
