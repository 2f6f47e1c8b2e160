//! # weir-intake
//!
//! Burst-to-queue intake core for the Weir ledger pipeline.
//!
//! This crate implements the intake domain, providing:
//!
//! - **Inventory claims**: contention-free allocation of unique slots from
//!   bounded pools under a thundering herd
//! - **Intake queue**: at-least-once delivery with visibility-timeout
//!   leasing and manual dead-letter routing
//! - **Bridge worker**: stateful drain enforcing per-message idempotency
//!   across the queue, the slot inventory, and the ledger
//! - **Reaper**: periodic recovery of orphaned reservations
//!
//! ## Core Concepts
//!
//! - **Slot**: one unit of inventory, identified by a uuid, with an
//!   `AVAILABLE → RESERVED → CONSUMED` lifecycle
//! - **Intent**: a queued message binding a user to a claimed slot; the
//!   per-message processing state travels in the payload itself
//! - **Idempotency key**: the slot id, reused as the dedup key for external
//!   validation and ledger commit so redelivery is always safe
//!
//! ## Guarantees
//!
//! - **No double allocation**: concurrent claimers never receive the same
//!   slot
//! - **At-least-once, idempotent commit**: a crashed drain redelivers, and
//!   replayed commits converge on a single ledger row
//! - **Bounded staleness**: reservations whose intent disappeared are
//!   returned to inventory after the orphan threshold
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use weir_core::{PoolId, UserId};
//! use weir_intake::claim::ClaimService;
//! use weir_intake::error::Result;
//! use weir_intake::queue::{InMemoryDeadLetterQueue, InMemoryIntakeQueue};
//! use weir_intake::slot::{InMemorySlotStore, SlotStore};
//!
//! # async fn demo() -> Result<()> {
//! let slots = Arc::new(InMemorySlotStore::new());
//! let dlq = Arc::new(InMemoryDeadLetterQueue::new());
//! let queue = Arc::new(InMemoryIntakeQueue::new("intake_queue", dlq));
//!
//! let pool = PoolId::new("launch-day");
//! slots.create_slots(&pool, 100).await?;
//!
//! let claims = ClaimService::new(slots, queue);
//! let reserved = claims
//!     .claim_resource_and_queue(&pool, &UserId::new("u1"))
//!     .await?;
//! assert!(reserved.is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod claim;
pub mod config;
pub mod dlq;
pub mod error;
pub mod ledger;
pub mod message;
pub mod metrics;
pub mod queue;
pub mod reaper;
pub mod slot;
pub mod webhook;
pub mod worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::claim::ClaimService;
    pub use crate::config::{ConfigStore, InMemoryConfigStore, PoolConfig};
    pub use crate::dlq::DlqAdmin;
    pub use crate::error::{Error, Result};
    pub use crate::ledger::{InMemoryLedger, LedgerClient, LedgerRecord};
    pub use crate::message::{DlqMessage, IntakeMessage, IntakeState, MessageEnvelope};
    pub use crate::metrics::IntakeMetrics;
    pub use crate::queue::{
        DeadLetterQueue, InMemoryDeadLetterQueue, InMemoryIntakeQueue, IntakeQueue,
    };
    pub use crate::reaper::Reaper;
    pub use crate::slot::{InMemorySlotStore, Slot, SlotStatus, SlotStore};
    pub use crate::webhook::{HttpWebhookDispatcher, WebhookDispatcher, WebhookOutcome};
    pub use crate::worker::{BridgeWorker, DrainSummary};
}
