//! Per-pool runtime configuration.
//!
//! Config rows are independent of the existence of slots: a pool may be
//! configured before any inventory is seeded, and seeded inventory may
//! (mis)exist without config. The bridge worker dead-letters intents for
//! unconfigured pools rather than guessing defaults.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use weir_core::PoolId;

use crate::error::{Error, Result};

/// Default ledger RPC invoked when no commit webhook is configured.
pub const DEFAULT_COMMIT_RPC: &str = "finalize_transaction";

fn default_batch_size() -> usize {
    100
}

fn default_visibility_timeout_secs() -> u32 {
    45
}

fn default_max_retries() -> u32 {
    10
}

fn default_is_active() -> bool {
    true
}

fn default_commit_rpc_name() -> String {
    DEFAULT_COMMIT_RPC.to_string()
}

/// Runtime parameters for one pool, consumed by the bridge worker and the
/// reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Messages drained per worker invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Queue lease duration in seconds.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u32,

    /// Deliveries tolerated before a message is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Deactivated pools have their intents dead-lettered on sight.
    #[serde(default = "default_is_active")]
    pub is_active: bool,

    /// External validation endpoint; unset means validation is vacuous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_webhook_url: Option<String>,

    /// Ledger RPC used when no commit webhook is configured.
    #[serde(default = "default_commit_rpc_name")]
    pub commit_rpc_name: String,

    /// Commit endpoint; set, it takes precedence over the ledger RPC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_webhook_url: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_retries: default_max_retries(),
            is_active: default_is_active(),
            validation_webhook_url: None,
            commit_rpc_name: default_commit_rpc_name(),
            commit_webhook_url: None,
        }
    }
}

impl PoolConfig {
    /// The lease duration as a [`Duration`].
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs as u64)
    }
}

/// Keyed lookup of per-pool configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetches the config for a pool, if one exists.
    async fn get(&self, pool_id: &PoolId) -> Result<Option<PoolConfig>>;

    /// Creates or replaces the config for a pool.
    async fn upsert(&self, pool_id: &PoolId, config: PoolConfig) -> Result<()>;

    /// Lists all configured pools.
    async fn list(&self) -> Result<Vec<(PoolId, PoolConfig)>>;
}

/// In-memory config store.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<HashMap<PoolId, PoolConfig>>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("config store lock poisoned")
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, pool_id: &PoolId) -> Result<Option<PoolConfig>> {
        let configs = self.configs.read().map_err(poison_err)?;
        Ok(configs.get(pool_id).cloned())
    }

    async fn upsert(&self, pool_id: &PoolId, config: PoolConfig) -> Result<()> {
        let mut configs = self.configs.write().map_err(poison_err)?;
        configs.insert(pool_id.clone(), config);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(PoolId, PoolConfig)>> {
        let configs = self.configs.read().map_err(poison_err)?;
        let mut all: Vec<_> = configs
            .iter()
            .map(|(id, config)| (id.clone(), config.clone()))
            .collect();
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(all)
    }
}
