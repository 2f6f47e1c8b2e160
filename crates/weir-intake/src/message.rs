//! Intake message payloads and envelopes.
//!
//! The per-message processing state lives **in the payload itself**
//! ([`IntakeState`]), not in a side table: a redelivered message carries
//! everything the bridge worker needs to resume mid-pipeline after a crash.
//! The queue envelope adds delivery bookkeeping (`msg_id`, `read_ct`,
//! visibility deadline) without interpreting the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weir_core::{MsgId, PoolId, SlotId, UserId};

use crate::error::{Error, Result};

/// Processing state embedded in an intake payload.
///
/// The visible progression for one logical intent is
/// `queued → validated → committed`, after which the message is deleted.
/// Transient failures never regress the state; they only delay the next
/// transition until redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeState {
    /// Enqueued by the claim operation; not yet validated.
    Queued,

    /// Accepted by the external validator (or vacuously, when no validator
    /// is configured for the pool).
    Validated,

    /// The ledger holds a confirmed record for this intent.
    Committed,
}

impl IntakeState {
    /// Returns true if the external validation step is still pending.
    #[must_use]
    pub const fn needs_validation(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// A user's durable intent to consume one claimed slot.
///
/// `resource_id` uniquely identifies the slot the message is bound to and
/// doubles as the idempotency key for validation and commit. Re-enqueueing
/// a payload with the same id resumes the same logical intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeMessage {
    /// Pool the claimed slot belongs to.
    pub pool_id: PoolId,
    /// Id of the claimed slot; the idempotency key.
    pub resource_id: SlotId,
    /// User holding the claim.
    pub user_id: UserId,
    /// Current position in the processing state machine.
    pub state: IntakeState,
}

impl IntakeMessage {
    /// Creates a fresh intent in the `queued` state.
    #[must_use]
    pub fn queued(pool_id: PoolId, resource_id: SlotId, user_id: UserId) -> Self {
        Self {
            pool_id,
            resource_id,
            user_id,
            state: IntakeState::Queued,
        }
    }

    /// Parses an intake message from a raw queue payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] when required fields are missing
    /// or ill-typed. Structural errors are terminal: the worker routes the
    /// raw payload to the DLQ rather than retrying it.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(payload.clone()).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Serializes the message back into a raw queue payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the message cannot be encoded.
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(Error::from)
    }
}

/// A leased message as returned by a queue read.
///
/// Envelope fields are owned by the queue; `payload` is carried verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Queue-assigned monotone identifier.
    pub msg_id: MsgId,
    /// Delivery counter, incremented on every read including this one.
    pub read_ct: u32,
    /// When the message was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Current visibility deadline; the message is invisible to other
    /// readers until this instant passes.
    pub vt: DateTime<Utc>,
    /// The raw payload.
    pub payload: serde_json::Value,
}

/// Why a message was routed to the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqReason {
    /// No configuration row exists for the message's pool.
    MissingConfig,
    /// The pool is configured but deactivated.
    InactivePool,
    /// `read_ct` exceeded the pool's `max_retries`.
    RetryExhausted,
    /// The payload was missing or had ill-typed fields.
    MalformedPayload,
}

impl std::fmt::Display for DlqReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::MissingConfig => "missing_config",
            Self::InactivePool => "inactive_pool",
            Self::RetryExhausted => "retry_exhausted",
            Self::MalformedPayload => "malformed_payload",
        };
        f.write_str(label)
    }
}

/// A dead-lettered message: the original payload plus routing provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    /// The message's id in the intake queue at the time of routing.
    pub original_msg_id: MsgId,
    /// The delivery count at the time of routing.
    pub final_read_ct: u32,
    /// When the message was moved to the DLQ.
    pub routed_to_dlq_at: DateTime<Utc>,
    /// Why it was routed.
    pub reason: DlqReason,
    /// The original payload, verbatim.
    pub payload: serde_json::Value,
}

impl DlqMessage {
    /// Returns the pool id embedded in the payload, if it parses.
    ///
    /// Malformed payloads (one of the routing reasons) may not carry one;
    /// those messages match no pool filter.
    #[must_use]
    pub fn pool_id(&self) -> Option<PoolId> {
        self.payload
            .get("pool_id")
            .and_then(serde_json::Value::as_str)
            .map(PoolId::from)
    }
}

/// A dead-lettered message with its DLQ-local envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEnvelope {
    /// Queue-assigned id within the DLQ (distinct from `original_msg_id`).
    pub msg_id: MsgId,
    /// The dead-lettered message.
    pub entry: DlqMessage,
}
