use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, watch};

use stockboard::alphavantage::AlphaVantageClient;
use stockboard::api::{self, ApiContext};
use stockboard::cache::PriceCache;
use stockboard::config::Config;
use stockboard::feed;
use stockboard::history::HistoryLog;
use stockboard::model::Snapshot;
use stockboard::refresh::RefreshOrchestrator;

const FEED_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    let universe = config.refresh.tracked_symbols();
    tracing::info!(
        symbols = ?universe,
        cycle_secs = config.refresh.cycle_secs,
        "Starting stockboard"
    );

    let source = AlphaVantageClient::new(&config.alphavantage);
    let cache = Arc::new(PriceCache::new());
    let history = Arc::new(HistoryLog::new(&config.storage.db_path));
    let orchestrator = Arc::new(RefreshOrchestrator::new(source, universe, cache, history));

    orchestrator.seed().await;

    let (feed_tx, _) = broadcast::channel::<Vec<Snapshot>>(FEED_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = feed::spawn_scheduler(
        Arc::clone(&orchestrator),
        Duration::from_secs(config.refresh.cycle_secs),
        feed_tx,
        shutdown_rx,
    );

    let app = api::router(ApiContext {
        orchestrator,
        default_history_limit: config.refresh.history_limit,
    });
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;
    Ok(())
}
