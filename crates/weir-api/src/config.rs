//! Server configuration.
//!
//! Configuration is environment-driven: every field has a default suitable
//! for local development, overridable through `WEIR_*` variables. Outside
//! debug mode the two bearer credentials are mandatory, so a production
//! deployment cannot come up with an open worker trigger or admin surface.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use weir_core::{Error, Result};

/// Configuration for the Weir API server.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled, missing bearer credentials disable the corresponding
    /// auth check instead of failing validation (dev/tests only).
    pub debug: bool,

    /// Bearer credential required by the worker trigger endpoint.
    #[serde(default)]
    pub worker_token: Option<String>,

    /// Elevated bearer credential required by DLQ admin and operator
    /// seeding endpoints.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Optional shared secret required to read `/metrics`.
    ///
    /// Callers provide either `X-Metrics-Secret: <secret>` or
    /// `Authorization: Bearer <secret>`. Empty values are treated as unset.
    #[serde(default)]
    pub metrics_secret: Option<String>,

    /// Background reaper cadence in seconds.
    pub reap_interval_secs: u64,

    /// Orphan threshold passed to the reaper, in seconds.
    ///
    /// Keep comfortably above `visibility_timeout × max_retries` of the
    /// busiest pool so a long-running retry is never raced.
    pub reap_threshold_secs: u64,

    /// Wall-clock budget for one drain invocation, in seconds.
    pub drain_budget_secs: u64,

    /// Per-call timeout for outbound webhook POSTs, in seconds.
    pub webhook_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("debug", &self.debug)
            .field("worker_token", &self.worker_token.as_ref().map(|_| "[REDACTED]"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "metrics_secret",
                &self.metrics_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("reap_interval_secs", &self.reap_interval_secs)
            .field("reap_threshold_secs", &self.reap_threshold_secs)
            .field("drain_budget_secs", &self.drain_budget_secs)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            worker_token: None,
            admin_token: None,
            metrics_secret: None,
            reap_interval_secs: 120,
            reap_threshold_secs: 900,
            drain_budget_secs: 50,
            webhook_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Loads configuration from `WEIR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable, or if a
    /// required credential is missing outside debug mode.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("WEIR_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("WEIR_DEBUG")? {
            config.debug = debug;
        }
        config.worker_token = env_string("WEIR_WORKER_TOKEN");
        config.admin_token = env_string("WEIR_ADMIN_TOKEN");
        config.metrics_secret = env_string("WEIR_METRICS_SECRET");
        if let Some(secs) = env_u64("WEIR_REAP_INTERVAL_SECS")? {
            config.reap_interval_secs = secs;
        }
        if let Some(secs) = env_u64("WEIR_REAP_THRESHOLD_SECS")? {
            config.reap_threshold_secs = secs;
        }
        if let Some(secs) = env_u64("WEIR_DRAIN_BUDGET_SECS")? {
            config.drain_budget_secs = secs;
        }
        if let Some(secs) = env_u64("WEIR_WEBHOOK_TIMEOUT_SECS")? {
            config.webhook_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates credential requirements against the debug posture.
    ///
    /// # Errors
    ///
    /// Returns an error when a bearer credential is missing and debug mode
    /// is off.
    pub fn validate(&self) -> Result<()> {
        if !self.debug {
            if self.worker_token.as_deref().is_none_or(str::is_empty) {
                return Err(Error::InvalidInput(
                    "WEIR_WORKER_TOKEN is required when WEIR_DEBUG=false".to_string(),
                ));
            }
            if self.admin_token.as_deref().is_none_or(str::is_empty) {
                return Err(Error::InvalidInput(
                    "WEIR_ADMIN_TOKEN is required when WEIR_DEBUG=false".to_string(),
                ));
            }
        }
        if self.reap_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "WEIR_REAP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The reaper cadence as a [`Duration`].
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// The orphan threshold as a [`Duration`].
    #[must_use]
    pub const fn reap_threshold(&self) -> Duration {
        Duration::from_secs(self.reap_threshold_secs)
    }

    /// The drain budget as a [`Duration`].
    #[must_use]
    pub const fn drain_budget(&self) -> Duration {
        Duration::from_secs(self.drain_budget_secs)
    }

    /// The webhook timeout as a [`Duration`].
    #[must_use]
    pub const fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    /// A permissive config for tests: debug on, no credentials.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    env_string(name)
        .map(|value| {
            value
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{name} must be a port number: {e}")))
        })
        .transpose()
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    env_string(name)
        .map(|value| {
            value
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{name} must be an integer: {e}")))
        })
        .transpose()
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    env_string(name)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(Error::InvalidInput(format!(
                "{name} must be a boolean, got '{other}'"
            ))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert!(!config.debug);
        assert_eq!(config.reap_interval_secs, 120);
        assert_eq!(config.reap_threshold_secs, 900);
        assert_eq!(config.drain_budget_secs, 50);
    }

    #[test]
    fn validate_requires_tokens_outside_debug() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            worker_token: Some("wk".into()),
            admin_token: Some("adm".into()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_mode_waives_tokens() {
        let config = Config::for_tests();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_reap_interval_rejected() {
        let config = Config {
            reap_interval_secs: 0,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_impl_redacts_secrets() {
        let config = Config {
            worker_token: Some("super-secret".into()),
            admin_token: Some("even-more-secret".into()),
            ..Config::for_tests()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("even-more-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
