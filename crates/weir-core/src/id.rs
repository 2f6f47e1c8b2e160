//! Strongly-typed identifiers for Weir entities.
//!
//! Identifiers come in two flavors:
//!
//! - **Opaque labels** ([`PoolId`], [`UserId`]): printable strings minted by
//!   operators or upstream identity systems; Weir never inspects their shape
//! - **Generated keys** ([`SlotId`], [`MsgId`]): minted by Weir itself, a
//!   UUID per inventory slot and a queue-local monotone counter per message
//!
//! # Example
//!
//! ```rust
//! use weir_core::id::{PoolId, SlotId};
//!
//! let pool = PoolId::new("launch-day-tickets");
//! let slot = SlotId::generate();
//!
//! // IDs are different types - this won't compile:
//! // let wrong: PoolId = slot;
//! # let _ = (pool, slot);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// An opaque identifier naming a cohort of interchangeable slots.
///
/// Pools partition inventory: a claim in pool `a` never touches slots in
/// pool `b`. Weir treats the id as an opaque printable label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Creates a pool id from any printable label.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PoolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An opaque identifier for the user holding a claim.
///
/// Minted by the identity layer upstream of Weir; carried through the slot
/// lock, the intake message, and the ledger record unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from any printable label.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A unique identifier for a single unit of inventory.
///
/// Slot ids are UUIDs generated once at slot creation and immutable for the
/// slot's lifetime. The same id doubles as the idempotency key for external
/// validation and ledger commit, so redeliveries of the same intent are safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(Uuid);

impl SlotId {
    /// Generates a new unique slot id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a slot id from a raw UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SlotId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| Error::InvalidId {
            message: format!("invalid slot ID '{s}': {e}"),
        })
    }
}

/// A queue-local message identifier.
///
/// Assigned by the queue as a monotone 64-bit counter; unique within one
/// queue instance and never reused. Ordering of ids reflects enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(u64);

impl MsgId {
    /// Creates a message id from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw 64-bit value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
