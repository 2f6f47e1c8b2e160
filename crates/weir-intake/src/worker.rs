//! The bridge worker: batch drain from the intake queue to the ledger.
//!
//! An external scheduler wakes the worker periodically; each invocation
//! calls [`BridgeWorker::drain_once`], which leases a batch, walks each
//! message through the payload state machine
//! (`queued → validated → committed`), marks the slot consumed, and
//! batch-acknowledges what it finished. Invocations are safe to run
//! concurrently: two drains lease disjoint batches.
//!
//! ## Failure boundary
//!
//! Only validator and commit-side failures are transient: the message is
//! left unacknowledged and redelivers after its lease expires. Structural
//! payload errors, missing or deactivated pool config, and retry exhaustion
//! are terminal and route to the DLQ with provenance. A slot-store failure
//! after a successful commit is logged and non-fatal: the ledger is
//! authoritative, and the reaper reconciles stragglers.
//!
//! ## Crash recovery
//!
//! Commit and slot-mark are not jointly transactional. Each successful step
//! persists the payload state back into the queued message, so a crash at
//! any point redelivers a message that resumes exactly where it stopped;
//! the ledger insert and both webhooks are idempotent on `resource_id`, so
//! replayed steps are no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use weir_core::observability::drain_span;
use weir_core::PoolId;

use crate::config::{ConfigStore, PoolConfig};
use crate::error::{Error, Result};
use crate::ledger::LedgerClient;
use crate::message::{DlqReason, IntakeMessage, IntakeState, MessageEnvelope};
use crate::metrics::IntakeMetrics;
use crate::queue::IntakeQueue;
use crate::slot::SlotStore;
use crate::webhook::{WebhookDispatcher, WebhookOutcome};

/// Bootstrap visibility timeout for the batch read.
///
/// Used only to lease the batch; per-message behavior follows the per-pool
/// config resolved afterwards.
pub const VT_FALLBACK: Duration = Duration::from_secs(45);

/// Bootstrap batch size for the batch read.
pub const BATCH_FALLBACK: usize = 100;

/// Default wall-clock budget for one invocation.
///
/// Sized to finish comfortably inside a 60-second platform deadline.
pub const DEFAULT_DRAIN_BUDGET: Duration = Duration::from_secs(50);

/// Structured summary of one drain invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainSummary {
    /// Messages committed, marked, and acknowledged.
    pub processed: usize,
    /// Messages routed to the DLQ.
    pub dlq: usize,
    /// Messages leased in the batch.
    pub total: usize,
}

impl DrainSummary {
    /// The summary of an invocation that found nothing to do.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            processed: 0,
            dlq: 0,
            total: 0,
        }
    }

    /// Returns true when the invocation leased no messages.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.total == 0
    }
}

/// What happened to one message within an invocation.
enum Disposition {
    /// Finished; queued for the batched acknowledgement.
    Acked,
    /// Routed to the DLQ.
    DeadLettered,
    /// Transient failure; left to redeliver after its lease expires.
    Deferred,
}

/// Stateful drain from the intake queue into the ledger.
pub struct BridgeWorker {
    queue: Arc<dyn IntakeQueue>,
    slots: Arc<dyn SlotStore>,
    configs: Arc<dyn ConfigStore>,
    ledger: Arc<dyn LedgerClient>,
    webhooks: Arc<dyn WebhookDispatcher>,
    drain_budget: Duration,
    read_visibility_timeout: Duration,
    read_batch_size: usize,
    metrics: IntakeMetrics,
}

impl BridgeWorker {
    /// Creates a worker over the given backends with default fallbacks.
    #[must_use]
    pub fn new(
        queue: Arc<dyn IntakeQueue>,
        slots: Arc<dyn SlotStore>,
        configs: Arc<dyn ConfigStore>,
        ledger: Arc<dyn LedgerClient>,
        webhooks: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        Self {
            queue,
            slots,
            configs,
            ledger,
            webhooks,
            drain_budget: DEFAULT_DRAIN_BUDGET,
            read_visibility_timeout: VT_FALLBACK,
            read_batch_size: BATCH_FALLBACK,
            metrics: IntakeMetrics::new(),
        }
    }

    /// Overrides the invocation wall-clock budget.
    #[must_use]
    pub const fn with_drain_budget(mut self, budget: Duration) -> Self {
        self.drain_budget = budget;
        self
    }

    /// Drains one batch from the intake queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueRead`] when the batch read itself fails; the
    /// invocation performed no acknowledgement, so no message is lost and
    /// the next scheduled invocation retries.
    pub async fn drain_once(&self) -> Result<DrainSummary> {
        let started = Instant::now();
        let batch = self
            .queue
            .read(self.read_visibility_timeout, self.read_batch_size)
            .await
            .map_err(|e| Error::QueueRead {
                message: e.to_string(),
            })?;

        if batch.is_empty() {
            return Ok(DrainSummary::empty());
        }

        let total = batch.len();
        let span = drain_span("drain_once", total);
        let summary = self.drain_batch(batch, started).instrument(span).await?;

        self.metrics.observe_drain_duration(started.elapsed());
        if let Ok(depth) = self.queue.depth().await {
            self.metrics.set_queue_depth("intake_queue", depth);
        }

        tracing::info!(
            processed = summary.processed,
            dlq = summary.dlq,
            total = summary.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "drain invocation complete"
        );
        Ok(summary)
    }

    async fn drain_batch(
        &self,
        batch: Vec<MessageEnvelope>,
        started: Instant,
    ) -> Result<DrainSummary> {
        let total = batch.len();
        let mut config_cache: HashMap<PoolId, Option<PoolConfig>> = HashMap::new();
        let mut ack_list = Vec::new();
        let mut dlq = 0;

        for envelope in &batch {
            if started.elapsed() >= self.drain_budget {
                tracing::warn!(
                    remaining = total - ack_list.len() - dlq,
                    "wall-clock budget exhausted; remainder left to redeliver"
                );
                break;
            }

            match self.process_one(envelope, &mut config_cache).await? {
                Disposition::Acked => {
                    self.metrics.record_disposition("processed");
                    ack_list.push(envelope.msg_id);
                }
                Disposition::DeadLettered => {
                    self.metrics.record_disposition("dead_lettered");
                    dlq += 1;
                }
                Disposition::Deferred => {
                    self.metrics.record_disposition("deferred");
                }
            }
        }

        if !ack_list.is_empty() {
            if let Err(err) = self.queue.delete(&ack_list).await {
                // The ledger rows exist; the undeleted messages redeliver
                // and replay as idempotent no-ops.
                tracing::warn!(
                    error = %err,
                    count = ack_list.len(),
                    "batched acknowledgement failed; messages will redeliver"
                );
            }
        }

        Ok(DrainSummary {
            processed: ack_list.len(),
            dlq,
            total,
        })
    }

    async fn process_one(
        &self,
        envelope: &MessageEnvelope,
        config_cache: &mut HashMap<PoolId, Option<PoolConfig>>,
    ) -> Result<Disposition> {
        let mut message = match IntakeMessage::from_payload(&envelope.payload) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(
                    msg_id = %envelope.msg_id,
                    error = %err,
                    "structurally invalid payload; dead-lettering"
                );
                self.queue
                    .move_to_dlq(
                        envelope.msg_id,
                        envelope.payload.clone(),
                        envelope.read_ct,
                        DlqReason::MalformedPayload,
                    )
                    .await?;
                return Ok(Disposition::DeadLettered);
            }
        };

        let config = self
            .resolve_config(&message.pool_id, config_cache)
            .await?;
        let Some(config) = config else {
            tracing::warn!(
                msg_id = %envelope.msg_id,
                pool_id = %message.pool_id,
                "no config for pool; dead-lettering"
            );
            self.queue
                .move_to_dlq(
                    envelope.msg_id,
                    envelope.payload.clone(),
                    envelope.read_ct,
                    DlqReason::MissingConfig,
                )
                .await?;
            return Ok(Disposition::DeadLettered);
        };

        if !config.is_active {
            tracing::warn!(
                msg_id = %envelope.msg_id,
                pool_id = %message.pool_id,
                "pool deactivated; dead-lettering"
            );
            self.queue
                .move_to_dlq(
                    envelope.msg_id,
                    envelope.payload.clone(),
                    envelope.read_ct,
                    DlqReason::InactivePool,
                )
                .await?;
            return Ok(Disposition::DeadLettered);
        }

        if envelope.read_ct > config.max_retries {
            tracing::warn!(
                msg_id = %envelope.msg_id,
                resource_id = %message.resource_id,
                read_ct = envelope.read_ct,
                max_retries = config.max_retries,
                "retries exhausted; dead-lettering"
            );
            self.queue
                .move_to_dlq(
                    envelope.msg_id,
                    envelope.payload.clone(),
                    envelope.read_ct,
                    DlqReason::RetryExhausted,
                )
                .await?;
            return Ok(Disposition::DeadLettered);
        }

        if message.state.needs_validation() && !self.validate(&config, &mut message, envelope).await? {
            return Ok(Disposition::Deferred);
        }

        if !self.commit(&config, &message).await {
            return Ok(Disposition::Deferred);
        }

        message.state = IntakeState::Committed;
        self.persist_state(envelope, &message).await;

        // Conditional transition: a prior attempt or a concurrent reaper may
        // already have handled the slot, and after a successful commit the
        // ledger is authoritative either way.
        match self.slots.mark_consumed(message.resource_id).await {
            Ok(true) => {
                tracing::debug!(resource_id = %message.resource_id, "slot consumed");
            }
            Ok(false) => {
                tracing::debug!(
                    resource_id = %message.resource_id,
                    "slot not in RESERVED; already consumed or reaped"
                );
            }
            Err(err) => {
                tracing::warn!(
                    resource_id = %message.resource_id,
                    error = %err,
                    "mark_consumed failed after commit; ledger is authoritative"
                );
            }
        }

        Ok(Disposition::Acked)
    }

    async fn resolve_config(
        &self,
        pool_id: &PoolId,
        cache: &mut HashMap<PoolId, Option<PoolConfig>>,
    ) -> Result<Option<PoolConfig>> {
        if let Some(cached) = cache.get(pool_id) {
            return Ok(cached.clone());
        }
        let config = self.configs.get(pool_id).await?;
        cache.insert(pool_id.clone(), config.clone());
        Ok(config)
    }

    /// Runs the validation step; returns true when processing may proceed.
    async fn validate(
        &self,
        config: &PoolConfig,
        message: &mut IntakeMessage,
        envelope: &MessageEnvelope,
    ) -> Result<bool> {
        if let Some(url) = config.validation_webhook_url.as_deref() {
            let outcome = self
                .webhooks
                .post(url, message, message.resource_id)
                .await;
            self.metrics.record_webhook("validation", outcome.label());
            match outcome {
                WebhookOutcome::Accepted => {}
                WebhookOutcome::Rejected { status } => {
                    tracing::warn!(
                        msg_id = %envelope.msg_id,
                        resource_id = %message.resource_id,
                        status,
                        "validator rejected; will redeliver"
                    );
                    return Ok(false);
                }
                WebhookOutcome::Unreachable { message: reason } => {
                    tracing::warn!(
                        msg_id = %envelope.msg_id,
                        resource_id = %message.resource_id,
                        reason = %reason,
                        "validator unreachable; will redeliver"
                    );
                    return Ok(false);
                }
            }
        }

        // Vacuously validated when no URL is configured.
        message.state = IntakeState::Validated;
        self.persist_state(envelope, message).await;
        Ok(true)
    }

    /// Runs the commit step; returns true on success.
    async fn commit(&self, config: &PoolConfig, message: &IntakeMessage) -> bool {
        if let Some(url) = config.commit_webhook_url.as_deref() {
            let outcome = self
                .webhooks
                .post(url, message, message.resource_id)
                .await;
            self.metrics.record_webhook("commit", outcome.label());
            if !outcome.is_accepted() {
                tracing::warn!(
                    resource_id = %message.resource_id,
                    outcome = outcome.label(),
                    "commit webhook failed; will redeliver"
                );
            }
            return outcome.is_accepted();
        }

        match self.ledger.call(&config.commit_rpc_name, message).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    resource_id = %message.resource_id,
                    rpc = %config.commit_rpc_name,
                    error = %err,
                    "ledger commit failed; will redeliver"
                );
                false
            }
        }
    }

    /// Persists the payload state back into the queued message, best-effort.
    ///
    /// Losing the write only costs a replay of an idempotent step on
    /// redelivery; it never loses the intent.
    async fn persist_state(&self, envelope: &MessageEnvelope, message: &IntakeMessage) {
        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(msg_id = %envelope.msg_id, error = %err, "state persist skipped");
                return;
            }
        };
        match self.queue.update_payload(envelope.msg_id, payload).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(msg_id = %envelope.msg_id, "message gone before state persist");
            }
            Err(err) => {
                tracing::warn!(msg_id = %envelope.msg_id, error = %err, "state persist failed");
            }
        }
    }
}
