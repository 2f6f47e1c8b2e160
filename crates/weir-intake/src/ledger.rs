//! Ledger client abstraction.
//!
//! The ledger is the authoritative system of record for confirmed intents.
//! It lives in a separate datastore from the slot inventory, and the bridge
//! worker deliberately never wraps the two in one transaction: the ledger
//! insert is idempotent on `resource_id`, so redeliveries after a crash
//! converge on the same single row.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weir_core::{PoolId, SlotId, UserId};

use crate::config::DEFAULT_COMMIT_RPC;
use crate::error::{Error, Result};
use crate::message::IntakeMessage;

/// A confirmed record in the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// The slot this record confirms; the insertion key.
    pub resource_id: SlotId,
    /// Pool the slot belonged to.
    pub pool_id: PoolId,
    /// User the slot was confirmed for.
    pub user_id: UserId,
    /// When the record was first inserted.
    pub confirmed_at: DateTime<Utc>,
}

/// Client for the ledger's commit RPCs.
///
/// The RPC name is configuration (`PoolConfig::commit_rpc_name`); every RPC
/// this trait dispatches performs insert-if-absent keyed by `resource_id`.
/// Success is any non-error return. Errors are treated as transient by the
/// bridge worker: the message is left unacknowledged and redelivers.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Invokes the named commit RPC with the full payload.
    async fn call(&self, rpc_name: &str, payload: &IntakeMessage) -> Result<()>;
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("ledger lock poisoned")
}

/// In-memory ledger.
///
/// Recognizes the default `finalize_transaction` RPC. The availability
/// toggle lets outage scenarios be scripted without a network.
#[derive(Debug)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<SlotId, LedgerRecord>>,
    available: AtomicBool,
}

impl InMemoryLedger {
    /// Creates an empty, available ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggles availability; while unavailable every call errors.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fetches the record for a resource, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn get(&self, resource_id: SlotId) -> Result<Option<LedgerRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(&resource_id).cloned())
    }

    /// Returns all records, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn records(&self) -> Result<Vec<LedgerRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.values().cloned().collect())
    }

    /// Returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.len())
    }

    /// Returns true when the ledger holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn call(&self, rpc_name: &str, payload: &IntakeMessage) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::LedgerUnavailable {
                message: "ledger datastore offline".into(),
            });
        }
        if rpc_name != DEFAULT_COMMIT_RPC {
            return Err(Error::UnknownRpc {
                name: rpc_name.to_string(),
            });
        }

        let mut records = self.records.write().map_err(poison_err)?;
        records
            .entry(payload.resource_id)
            .or_insert_with(|| LedgerRecord {
                resource_id: payload.resource_id,
                pool_id: payload.pool_id.clone(),
                user_id: payload.user_id.clone(),
                confirmed_at: Utc::now(),
            });
        Ok(())
    }
}
