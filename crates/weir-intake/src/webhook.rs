//! Outbound webhook dispatch.
//!
//! This module provides:
//!
//! - [`WebhookDispatcher`]: trait for POSTing intake payloads to external
//!   validation and commit endpoints
//! - [`HttpWebhookDispatcher`]: reqwest-backed production implementation
//! - [`StaticWebhookDispatcher`]: scriptable implementation for tests
//!
//! ## Failure model
//!
//! A dispatch never returns `Err`: every failure mode (non-2xx status,
//! timeout, connect failure) is a [`WebhookOutcome`] the bridge worker
//! treats as transient. The `X-Idempotency-Key` header carries the resource
//! id, so a redelivered intent is safe to re-POST.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use weir_core::SlotId;

use crate::message::IntakeMessage;

/// Header carrying the idempotency key on every webhook POST.
pub const IDEMPOTENCY_KEY_HEADER: &str = "X-Idempotency-Key";

/// Default per-call timeout for webhook POSTs.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// The result of one webhook POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The endpoint returned 2xx.
    Accepted,
    /// The endpoint responded with a non-2xx status.
    Rejected {
        /// The HTTP status returned.
        status: u16,
    },
    /// The endpoint could not be reached (timeout, connect failure).
    Unreachable {
        /// Description of the transport failure.
        message: String,
    },
}

impl WebhookOutcome {
    /// Returns true if the endpoint accepted the payload.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Unreachable { .. } => "unreachable",
        }
    }
}

/// Dispatches intake payloads to external HTTP endpoints.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// POSTs the payload as JSON with `X-Idempotency-Key: <resource id>`.
    async fn post(
        &self,
        url: &str,
        payload: &IntakeMessage,
        idempotency_key: SlotId,
    ) -> WebhookOutcome;
}

/// Production webhook dispatcher over reqwest.
#[derive(Debug, Clone)]
pub struct HttpWebhookDispatcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpWebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpWebhookDispatcher {
    /// Creates a dispatcher with the default per-call timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_WEBHOOK_TIMEOUT)
    }

    /// Creates a dispatcher with an explicit per-call timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Failed to configure reqwest client; using defaults"
                );
                reqwest::Client::new()
            }
        };
        Self { client, timeout }
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookDispatcher {
    async fn post(
        &self,
        url: &str,
        payload: &IntakeMessage,
        idempotency_key: SlotId,
    ) -> WebhookOutcome {
        let response = self
            .client
            .post(url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.to_string())
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => WebhookOutcome::Accepted,
            Ok(resp) => WebhookOutcome::Rejected {
                status: resp.status().as_u16(),
            },
            Err(err) => WebhookOutcome::Unreachable {
                message: err.to_string(),
            },
        }
    }
}

/// One recorded dispatch, for assertions.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    /// Target URL.
    pub url: String,
    /// Payload as POSTed.
    pub payload: IntakeMessage,
    /// Value sent in `X-Idempotency-Key`.
    pub idempotency_key: SlotId,
}

/// Scriptable webhook dispatcher for tests.
///
/// Responds [`WebhookOutcome::Accepted`] unless an outcome has been scripted
/// for the URL, and records every dispatch.
#[derive(Debug, Default)]
pub struct StaticWebhookDispatcher {
    outcomes: Mutex<HashMap<String, WebhookOutcome>>,
    calls: Mutex<Vec<RecordedPost>>,
}

impl StaticWebhookDispatcher {
    /// Creates a dispatcher that accepts everything.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Scripts the outcome for a URL.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn respond_with(&self, url: impl Into<String>, outcome: WebhookOutcome) {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .insert(url.into(), outcome);
    }

    /// Returns every dispatch recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedPost> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl WebhookDispatcher for StaticWebhookDispatcher {
    async fn post(
        &self,
        url: &str,
        payload: &IntakeMessage,
        idempotency_key: SlotId,
    ) -> WebhookOutcome {
        self.calls.lock().expect("calls lock").push(RecordedPost {
            url: url.to_string(),
            payload: payload.clone(),
            idempotency_key,
        });
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .get(url)
            .cloned()
            .unwrap_or(WebhookOutcome::Accepted)
    }
}
