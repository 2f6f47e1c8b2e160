//! End-to-end scenarios for the claim → queue → drain pipeline.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use weir_core::{PoolId, SlotId, UserId};
use weir_intake::claim::ClaimService;
use weir_intake::config::{ConfigStore, InMemoryConfigStore, PoolConfig};
use weir_intake::ledger::{InMemoryLedger, LedgerClient};
use weir_intake::message::{IntakeMessage, IntakeState};
use weir_intake::queue::{
    DeadLetterQueue, InMemoryDeadLetterQueue, InMemoryIntakeQueue, IntakeQueue,
};
use weir_intake::reaper::Reaper;
use weir_intake::slot::{InMemorySlotStore, SlotStatus, SlotStore};
use weir_intake::webhook::{StaticWebhookDispatcher, WebhookOutcome};
use weir_intake::worker::{BridgeWorker, DrainSummary};

struct Pipeline {
    slots: Arc<InMemorySlotStore>,
    queue: Arc<InMemoryIntakeQueue>,
    dlq: Arc<InMemoryDeadLetterQueue>,
    configs: Arc<InMemoryConfigStore>,
    ledger: Arc<InMemoryLedger>,
    webhooks: Arc<StaticWebhookDispatcher>,
    claims: ClaimService,
    worker: BridgeWorker,
}

fn pipeline() -> Pipeline {
    let slots = Arc::new(InMemorySlotStore::new());
    let dlq = Arc::new(InMemoryDeadLetterQueue::new());
    let queue = Arc::new(InMemoryIntakeQueue::new(
        "intake_queue",
        Arc::clone(&dlq) as _,
    ));
    let configs = Arc::new(InMemoryConfigStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let webhooks = Arc::new(StaticWebhookDispatcher::accepting());

    let claims = ClaimService::new(Arc::clone(&slots) as _, Arc::clone(&queue) as _);
    let worker = BridgeWorker::new(
        Arc::clone(&queue) as _,
        Arc::clone(&slots) as _,
        Arc::clone(&configs) as _,
        Arc::clone(&ledger) as _,
        Arc::clone(&webhooks) as _,
    );

    Pipeline {
        slots,
        queue,
        dlq,
        configs,
        ledger,
        webhooks,
        claims,
        worker,
    }
}

async fn concurrent_claims(
    pipeline: &Pipeline,
    pool: &PoolId,
    users: &[&str],
) -> Result<Vec<Option<SlotId>>> {
    let claims = Arc::new(ClaimService::new(
        Arc::clone(&pipeline.slots) as _,
        Arc::clone(&pipeline.queue) as _,
    ));

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let claims = Arc::clone(&claims);
            let pool = pool.clone();
            let user = UserId::new(*user);
            tokio::spawn(async move { claims.claim_resource_and_queue(&pool, &user).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await??);
    }
    Ok(results)
}

/// Scenario 1: five callers race for three slots; exactly three win.
#[tokio::test]
async fn sold_out_race() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 3).await?;

    let results = concurrent_claims(&pipeline, &pool, &["u1", "u2", "u3", "u4", "u5"]).await?;

    let mut winners: Vec<_> = results.iter().filter_map(|r| *r).collect();
    winners.sort_by_key(SlotId::to_string);
    winners.dedup();
    assert_eq!(winners.len(), 3, "exactly three distinct slot ids");
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 2);
    assert_eq!(pipeline.queue.depth().await?, 3);
    Ok(())
}

/// Scenario 2: one invocation drains the race's intents into the ledger.
#[tokio::test]
async fn happy_drain() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 3).await?;
    pipeline
        .configs
        .upsert(
            &pool,
            PoolConfig {
                batch_size: 10,
                max_retries: 10,
                ..PoolConfig::default()
            },
        )
        .await?;

    let results = concurrent_claims(&pipeline, &pool, &["u1", "u2", "u3", "u4", "u5"]).await?;
    let winners: Vec<_> = results.iter().filter_map(|r| *r).collect();
    assert_eq!(winners.len(), 3);

    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(
        summary,
        DrainSummary {
            processed: 3,
            dlq: 0,
            total: 3
        }
    );

    assert_eq!(pipeline.ledger.len()?, 3);
    for slot_id in winners {
        assert!(pipeline.ledger.get(slot_id)?.is_some());
        let slot = pipeline.slots.get(slot_id).await?.expect("row");
        assert_eq!(slot.status, SlotStatus::Consumed);
    }
    assert_eq!(pipeline.queue.depth().await?, 0);
    Ok(())
}

/// Scenario 3: a ledger outage defers the whole batch; recovery drains it.
#[tokio::test]
async fn ledger_outage_and_recovery() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 3).await?;
    pipeline.configs.upsert(&pool, PoolConfig::default()).await?;

    let mut winners = Vec::new();
    for user in ["u1", "u2", "u3"] {
        winners.push(
            pipeline
                .claims
                .claim_resource_and_queue(&pool, &UserId::new(user))
                .await?
                .expect("slot"),
        );
    }

    pipeline.ledger.set_available(false);
    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(
        summary,
        DrainSummary {
            processed: 0,
            dlq: 0,
            total: 3
        }
    );

    assert_eq!(pipeline.queue.depth().await?, 3);
    for envelope in pipeline.queue.snapshot()? {
        assert_eq!(envelope.read_ct, 1);
    }
    for slot_id in &winners {
        let slot = pipeline.slots.get(*slot_id).await?.expect("row");
        assert_eq!(slot.status, SlotStatus::Reserved);
    }

    // Restore the ledger; the next invocation (after the lease lapses)
    // drains everything.
    pipeline.ledger.set_available(true);
    pipeline.queue.release_leases()?;
    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(summary.processed, 3);
    for slot_id in &winners {
        let slot = pipeline.slots.get(*slot_id).await?.expect("row");
        assert_eq!(slot.status, SlotStatus::Consumed);
    }
    assert_eq!(pipeline.queue.depth().await?, 0);
    Ok(())
}

/// Scenario 4: a permanent commit failure exhausts retries into the DLQ.
#[tokio::test]
async fn retry_exhaustion_routes_to_dlq() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 3).await?;
    pipeline
        .configs
        .upsert(
            &pool,
            PoolConfig {
                max_retries: 2,
                ..PoolConfig::default()
            },
        )
        .await?;
    pipeline.ledger.set_available(false);

    let mut winners = Vec::new();
    for user in ["u1", "u2", "u3"] {
        winners.push(
            pipeline
                .claims
                .claim_resource_and_queue(&pool, &UserId::new(user))
                .await?
                .expect("slot"),
        );
    }

    // Reads 1 and 2 defer; read 3 exceeds max_retries and dead-letters.
    for _ in 0..2 {
        let summary = pipeline.worker.drain_once().await?;
        assert_eq!(summary.dlq, 0);
        pipeline.queue.release_leases()?;
    }
    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(summary.dlq, 3);
    assert_eq!(summary.processed, 0);

    assert_eq!(pipeline.queue.depth().await?, 0);
    let dead = pipeline.dlq.list(None).await?;
    assert_eq!(dead.len(), 3);
    for envelope in &dead {
        assert!(envelope.entry.final_read_ct >= 3);
        assert!(envelope.entry.original_msg_id.value() > 0);
        let payload = IntakeMessage::from_payload(&envelope.entry.payload)?;
        assert!(winners.contains(&payload.resource_id));
    }

    // Slots stay RESERVED until the reaper gets to them.
    for slot_id in &winners {
        let slot = pipeline.slots.get(*slot_id).await?.expect("row");
        assert_eq!(slot.status, SlotStatus::Reserved);
    }
    let reaper = Reaper::new(
        Arc::clone(&pipeline.slots) as _,
        Arc::clone(&pipeline.queue) as _,
    )
    .with_threshold(Duration::ZERO);
    assert_eq!(reaper.reap_once().await?, 3);
    Ok(())
}

/// Scenario 5: a claim whose enqueue never happened is reaped.
#[tokio::test]
async fn orphan_reap() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 1).await?;

    // Simulate the claim/send split failure: reserve without enqueueing.
    let slot_id = pipeline
        .slots
        .claim_one(&pool, &UserId::new("u1"))
        .await?
        .expect("slot");

    let reaper = Reaper::new(
        Arc::clone(&pipeline.slots) as _,
        Arc::clone(&pipeline.queue) as _,
    )
    .with_threshold(Duration::ZERO);
    assert_eq!(reaper.reap_once().await?, 1);

    let slot = pipeline.slots.get(slot_id).await?.expect("row");
    assert_eq!(slot.status, SlotStatus::Available);
    assert!(slot.locked_by.is_none());
    assert!(slot.locked_at.is_none());
    Ok(())
}

/// Scenario 6: commit via webhook, success and failure sides.
#[tokio::test]
async fn webhook_commit_mode() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 2).await?;
    pipeline
        .configs
        .upsert(
            &pool,
            PoolConfig {
                commit_webhook_url: Some("http://ledger.test/commit".into()),
                ..PoolConfig::default()
            },
        )
        .await?;

    // Success: 200 consumes the slot and deletes the message.
    let slot_id = pipeline
        .claims
        .claim_resource_and_queue(&pool, &UserId::new("u1"))
        .await?
        .expect("slot");
    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(summary.processed, 1);

    let calls = pipeline.webhooks.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "http://ledger.test/commit");
    assert_eq!(calls[0].idempotency_key, slot_id);
    assert_eq!(calls[0].payload.resource_id, slot_id);
    assert_eq!(calls[0].payload.state, IntakeState::Validated);

    let slot = pipeline.slots.get(slot_id).await?.expect("row");
    assert_eq!(slot.status, SlotStatus::Consumed);
    assert_eq!(pipeline.queue.depth().await?, 0);
    // The RPC ledger was never involved.
    assert!(pipeline.ledger.is_empty()?);

    // Failure: 500 leaves the slot reserved and the message redelivering.
    pipeline.webhooks.respond_with(
        "http://ledger.test/commit",
        WebhookOutcome::Rejected { status: 500 },
    );
    let slot_id = pipeline
        .claims
        .claim_resource_and_queue(&pool, &UserId::new("u2"))
        .await?
        .expect("slot");
    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(
        summary,
        DrainSummary {
            processed: 0,
            dlq: 0,
            total: 1
        }
    );

    let slot = pipeline.slots.get(slot_id).await?.expect("row");
    assert_eq!(slot.status, SlotStatus::Reserved);
    assert_eq!(pipeline.queue.depth().await?, 1);

    pipeline.queue.release_leases()?;
    let redelivered = pipeline.queue.snapshot()?;
    assert_eq!(redelivered[0].read_ct, 1);
    let again = pipeline.worker.drain_once().await?;
    assert_eq!(again.total, 1);
    assert_eq!(pipeline.queue.snapshot()?[0].read_ct, 2);
    Ok(())
}

/// A crash between commit and acknowledgement converges on redelivery.
#[tokio::test]
async fn redelivery_after_commit_is_idempotent() -> Result<()> {
    let pipeline = pipeline();
    let pool = PoolId::new("p1");
    pipeline.slots.create_slots(&pool, 1).await?;
    pipeline.configs.upsert(&pool, PoolConfig::default()).await?;

    let slot_id = pipeline
        .claims
        .claim_resource_and_queue(&pool, &UserId::new("u1"))
        .await?
        .expect("slot");

    // Simulate the crash window: the ledger row exists, the slot was
    // consumed, but the acknowledgement never happened.
    let snapshot = pipeline.queue.snapshot()?;
    let mut message = IntakeMessage::from_payload(&snapshot[0].payload)?;
    message.state = IntakeState::Validated;
    pipeline
        .ledger
        .call("finalize_transaction", &message)
        .await?;
    pipeline.slots.mark_consumed(slot_id).await?;

    let summary = pipeline.worker.drain_once().await?;
    assert_eq!(summary.processed, 1);

    // Same final state as the no-crash run: one row, consumed, empty queue.
    assert_eq!(pipeline.ledger.len()?, 1);
    let slot = pipeline.slots.get(slot_id).await?.expect("row");
    assert_eq!(slot.status, SlotStatus::Consumed);
    assert_eq!(pipeline.queue.depth().await?, 0);
    Ok(())
}
