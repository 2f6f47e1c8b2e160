//! `weir-api` binary entrypoint.
//!
//! Loads configuration from environment variables, starts the HTTP server,
//! and runs the orphan reaper on its own cadence.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use weir_api::config::Config;
use weir_api::metrics::init_metrics;
use weir_api::server::{AppState, Server};
use weir_core::observability::{init_logging, LogFormat};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

fn spawn_reaper(state: Arc<AppState>) {
    let interval = state.config.reap_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a restart storm
        // doesn't sweep before the queue settles.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.reaper.reap_once().await {
                Ok(reaped) if reaped > 0 => {
                    tracing::info!(reaped, "reaper pass complete");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "reaper pass failed; will retry next tick");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));
    init_metrics();

    if config.debug {
        tracing::warn!("WEIR_DEBUG=true; unset bearer credentials disable auth checks");
    }

    let server = Server::new(config);
    spawn_reaper(server.state());
    server.serve().await
}
