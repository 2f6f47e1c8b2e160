//! Intake queue abstraction.
//!
//! This module provides:
//!
//! - [`IntakeQueue`]: trait for the durable intent queue with
//!   visibility-timeout leasing
//! - [`DeadLetterQueue`]: trait for the companion DLQ
//! - [`InMemoryIntakeQueue`] / [`InMemoryDeadLetterQueue`]: in-memory
//!   implementations
//!
//! ## Delivery guarantee
//!
//! At-least-once. A read leases a message by pushing its visibility deadline
//! into the future; a consumer that crashes simply lets the lease expire and
//! the message redelivers. `read_ct` counts every delivery, including the
//! one about to be processed, and is how redeliveries are distinguished.
//!
//! ## Dead-lettering
//!
//! Dead-lettering is **manual**: [`IntakeQueue::move_to_dlq`] is an explicit
//! queue operation (enrich, send to DLQ, delete the source message as one
//! logical step), not a property of failed messages.

pub mod memory;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use weir_core::{MsgId, PoolId, SlotId};

use crate::error::Result;
use crate::message::{DlqEnvelope, DlqMessage, DlqReason, MessageEnvelope};

pub use memory::{InMemoryDeadLetterQueue, InMemoryIntakeQueue};

/// Durable FIFO-ish queue with visibility leases.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; concurrent readers lease disjoint
/// messages.
#[async_trait]
pub trait IntakeQueue: Send + Sync {
    /// Appends a payload and returns its new message id.
    async fn send(&self, payload: serde_json::Value) -> Result<MsgId>;

    /// Leases up to `max_count` currently visible messages.
    ///
    /// Each returned message has its visibility deadline extended by
    /// `visibility_timeout` and its `read_ct` incremented. Messages leased
    /// to another reader are invisible. Returns an empty batch promptly
    /// when nothing is visible.
    async fn read(
        &self,
        visibility_timeout: Duration,
        max_count: usize,
    ) -> Result<Vec<MessageEnvelope>>;

    /// Permanently removes messages by id. Returns how many were removed.
    async fn delete(&self, msg_ids: &[MsgId]) -> Result<usize>;

    /// Replaces a message's payload in place, preserving its envelope.
    ///
    /// Used by the bridge worker to persist payload state transitions
    /// (`queued → validated → committed`) so a crash never makes a later
    /// state observable before an earlier one reached storage.
    ///
    /// Returns `false` if the message no longer exists.
    async fn update_payload(&self, msg_id: MsgId, payload: serde_json::Value) -> Result<bool>;

    /// Sends an enriched copy of the payload to the DLQ and deletes the
    /// source message, as one logical operation.
    async fn move_to_dlq(
        &self,
        msg_id: MsgId,
        payload: serde_json::Value,
        read_ct: u32,
        reason: DlqReason,
    ) -> Result<()>;

    /// Returns the number of messages currently in the queue, leased or not.
    async fn depth(&self) -> Result<usize>;

    /// Returns the set of `resource_id`s carried by live messages.
    ///
    /// The reaper uses this to distinguish orphaned reservations from
    /// reservations whose intent is still in flight. Payloads without a
    /// parseable `resource_id` contribute nothing to the set.
    async fn live_resource_ids(&self) -> Result<HashSet<SlotId>>;
}

/// The dead-letter side of the two-queue topology.
#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    /// Appends a dead-lettered message and returns its DLQ-local id.
    async fn push(&self, dead: DlqMessage) -> Result<MsgId>;

    /// Lists dead-lettered messages, optionally filtered by the pool id
    /// embedded in the original payload.
    async fn list(&self, pool_id: Option<&PoolId>) -> Result<Vec<DlqEnvelope>>;

    /// Fetches specific messages by id without removing them.
    async fn fetch(&self, msg_ids: &[MsgId]) -> Result<Vec<DlqEnvelope>>;

    /// Permanently removes messages by id. Returns how many were removed.
    async fn delete(&self, msg_ids: &[MsgId]) -> Result<usize>;

    /// Returns the number of dead-lettered messages.
    async fn depth(&self) -> Result<usize>;
}
