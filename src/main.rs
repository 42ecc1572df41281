//! Polls every configured status page and serves the aggregated result.
//!
//! API:
//!
//! - `GET /services`: JSON list of monitored services with status and message.
//! - `GET /services/:name`: one service.
//! - `GET /families`: one entry per upstream endpoint, with its last error.
//!
//! Run with
//!
//! ```not_rust
//! RUST_LOG=cloud_status=debug cargo run
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use cloud_status::config::{load_bootstrap_config, Bootstrap};
use cloud_status::core::*;
use tokio::sync::mpsc;
use tokio::time;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloud_status=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_bootstrap_config().unwrap_or_else(|| {
        tracing::info!("no usable application.yml, running with defaults");
        Bootstrap::default()
    });
    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("invalid server.addr {}", config.server.addr))?;

    let fetcher = Arc::new(HttpFetcher::new(config.poll.timeout()).context("building http client")?);
    let registry = Arc::new(Registry::new(
        &config.families(),
        fetcher,
        config.poll.freshness(),
    ));
    tracing::info!(
        families = registry.families().len(),
        services = registry.services().len(),
        "registry ready"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut logger = Logger::new(config.notify_on_change);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            logger.log(event);
        }
    });

    let poll_registry = registry.clone();
    let interval = config.poll.interval();
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        let mut should_export = 0;
        loop {
            ticker.tick().await;
            for service in poll_registry.services() {
                let tx = tx.clone();
                service.update_status(move |s| {
                    let _ = tx.send(Event::Heartbeat(s.status_report()));
                });
            }
            // Every fifth round, summarize what the logger has seen so far.
            should_export += 1;
            if should_export == 5 {
                let _ = tx.send(Event::CheckAll);
                should_export = 0;
            }
        }
    });

    listen(addr, registry).await
}
