//! Metrics middleware and the Prometheus endpoint.
//!
//! Installs the global Prometheus recorder the `metrics` facade feeds
//! (both this crate's request metrics and weir-intake's pipeline metrics),
//! tracks per-endpoint request counts and latency, and renders everything
//! at `GET /metrics`.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::auth::extract_bearer_token;
use crate::server::AppState;

/// API request duration histogram.
pub const API_REQUEST_DURATION: &str = "weir_api_request_duration_seconds";

/// API request counter.
pub const API_REQUEST_TOTAL: &str = "weir_api_request_total";

const UNMATCHED_ENDPOINT: &str = "unmatched";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initializes the global metrics recorder with a Prometheus exporter.
///
/// Safe to call multiple times; subsequent calls are no-ops. Returns a
/// handle for rendering; the handle is also stored globally for the
/// `/metrics` endpoint.
///
/// # Panics
///
/// Panics if the recorder cannot be installed; the server should not start
/// without its metrics.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_histogram!(API_REQUEST_DURATION, "Duration of API requests in seconds");
            describe_counter!(API_REQUEST_TOTAL, "Total number of API requests");

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ENDPOINT.to_string(), |path| path.as_str().to_string())
}

/// Middleware recording request count and latency per endpoint.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = endpoint_label(&request);
    let method = request.method().as_str().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(
        API_REQUEST_TOTAL,
        "endpoint" => endpoint.clone(),
        "method" => method,
        "status" => status,
    )
    .increment(1);
    histogram!(API_REQUEST_DURATION, "endpoint" => endpoint)
        .record(started.elapsed().as_secs_f64());

    response
}

fn metrics_access_allowed(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.trim().is_empty()) else {
        return true;
    };

    let header_match = headers
        .get("x-metrics-secret")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == secret);
    let bearer_match = extract_bearer_token(headers).is_some_and(|token| token == secret);

    header_match || bearer_match
}

/// `GET /metrics` handler rendering the Prometheus exposition format.
pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !metrics_access_allowed(&headers, state.config.metrics_secret.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match prometheus_handle() {
        Some(handle) => handle.render().into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not initialized",
        )
            .into_response(),
    }
}
