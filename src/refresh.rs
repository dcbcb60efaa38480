use futures_util::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::alphavantage::QuoteSource;
use crate::analytics::{self, SymbolAnalytics};
use crate::cache::PriceCache;
use crate::error::AppError;
use crate::history::{HistoryLog, HistoryStats};
use crate::model::{percent_change, HistoryRecord, Quote, Snapshot};
use crate::simulator::SimulatedGenerator;

/// Process-wide data-source mode, decided once at startup from credential
/// presence and fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceMode {
    RealApi,
    Simulated,
}

impl std::fmt::Display for DataSourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceMode::RealApi => write!(f, "real_api"),
            DataSourceMode::Simulated => write!(f, "simulated"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSourceInfo {
    pub mode: DataSourceMode,
    pub api_configured: bool,
    pub tracked_symbols: usize,
    pub symbols: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefreshAllOutcome {
    pub refreshed: usize,
    pub skipped: usize,
}

/// Seed price for a symbol that could not be fetched at startup.
fn seed_price(symbol: &str) -> f64 {
    match symbol {
        "AAPL" => 150.0,
        "GOOGL" => 2700.0,
        "MSFT" => 300.0,
        "TSLA" => 200.0,
        "AMZN" => 3400.0,
        "META" => 320.0,
        _ => 100.0,
    }
}

/// The refresh orchestration core.
///
/// Owns the per-cycle real-vs-simulated decision, drives the quote source and
/// the synthetic generator, and keeps the price cache, the history log, and
/// the outgoing snapshot set mutually consistent. Holds no cross-symbol lock
/// of its own: per-symbol refresh steps run concurrently and serialize only
/// through the cache's and the log's internal synchronization.
pub struct RefreshOrchestrator<S> {
    source: S,
    mode: DataSourceMode,
    universe: Vec<String>,
    cache: Arc<PriceCache>,
    history: Arc<HistoryLog>,
    generator: SimulatedGenerator,
    // Round-robin cursor over the universe; advances once per cycle in
    // real-API mode regardless of fetch outcome.
    cursor: AtomicUsize,
}

impl<S: QuoteSource> RefreshOrchestrator<S> {
    pub fn new(
        source: S,
        universe: Vec<String>,
        cache: Arc<PriceCache>,
        history: Arc<HistoryLog>,
    ) -> Self {
        let mode = if source.is_configured() {
            DataSourceMode::RealApi
        } else {
            DataSourceMode::Simulated
        };
        Self {
            source,
            mode,
            universe,
            cache,
            history,
            generator: SimulatedGenerator::default(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> DataSourceMode {
        self.mode
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Seed every tracked symbol. In real-API mode each symbol gets one fetch
    /// attempt; any non-success falls back to the static seed-price table,
    /// the same fallback rule steady-state cycles use.
    pub async fn seed(&self) {
        for symbol in &self.universe {
            if self.mode == DataSourceMode::RealApi {
                match self.source.fetch(symbol).await {
                    Ok(quote) => {
                        let snapshot = self.apply_quote(symbol, &quote);
                        tracing::info!(symbol = %symbol, price = snapshot.price, "seeded with real quote");
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(symbol = %symbol, %err, "seed fetch failed, using seed price");
                    }
                }
            }
            let price = seed_price(symbol);
            self.cache.upsert(symbol, price, 0.0, 0.0);
            self.record_history(symbol, price);
            tracing::info!(symbol = %symbol, price, "seeded with static price");
        }
        tracing::info!(
            mode = %self.mode,
            tracked = self.universe.len(),
            "price cache seeded"
        );
    }

    /// Run one refresh cycle over the whole universe and return the resulting
    /// snapshot set for fan-out.
    ///
    /// In simulated mode every symbol takes a synthetic step. In real-API
    /// mode exactly one symbol per cycle, chosen by rotation, attempts a real
    /// fetch; the rest simulate. No symbol failure aborts the cycle, so the
    /// returned set is always complete.
    pub async fn run_cycle(&self) -> Vec<Snapshot> {
        if self.universe.is_empty() {
            return Vec::new();
        }
        let designated = match self.mode {
            DataSourceMode::RealApi => {
                Some(self.cursor.fetch_add(1, Ordering::SeqCst) % self.universe.len())
            }
            DataSourceMode::Simulated => None,
        };

        let refreshes = self
            .universe
            .iter()
            .enumerate()
            .map(|(index, symbol)| self.refresh_symbol(symbol, designated == Some(index)));
        join_all(refreshes).await
    }

    /// Refresh one symbol: real fetch when designated, simulated otherwise.
    /// A failed real fetch falls back to a simulated step in the same call,
    /// so the snapshot always moves.
    async fn refresh_symbol(&self, symbol: &str, attempt_real: bool) -> Snapshot {
        if attempt_real {
            match self.source.fetch(symbol).await {
                Ok(quote) => {
                    let snapshot = self.apply_quote(symbol, &quote);
                    tracing::info!(
                        symbol = %symbol,
                        price = snapshot.price,
                        change_percent = snapshot.change_percent,
                        "real quote applied"
                    );
                    return snapshot;
                }
                Err(err) if err.is_rate_limited() => {
                    tracing::debug!(symbol = %symbol, %err, "fetch rate limited, simulating");
                }
                Err(err) => {
                    tracing::warn!(symbol = %symbol, %err, "fetch failed, simulating");
                }
            }
        }
        self.simulated_update(symbol)
    }

    /// Manual single-symbol refresh. Unknown symbols report `None` rather
    /// than a fault.
    pub async fn refresh_one(&self, symbol: &str) -> Option<Snapshot> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if !self.universe.iter().any(|s| s == &symbol) {
            return None;
        }
        let attempt_real = self.mode == DataSourceMode::RealApi;
        Some(self.refresh_symbol(&symbol, attempt_real).await)
    }

    /// Fire-and-continue variant of [`refresh_one`]: the caller may discard
    /// the handle, the refresh still completes and updates shared state.
    ///
    /// [`refresh_one`]: Self::refresh_one
    pub fn spawn_refresh_one(
        self: &Arc<Self>,
        symbol: String,
    ) -> tokio::task::JoinHandle<Option<Snapshot>>
    where
        S: Send + Sync + 'static,
    {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.refresh_one(&symbol).await })
    }

    /// Attempt a real fetch for every tracked symbol, no rotation. Still
    /// subject to the per-symbol rate gate; symbols whose fetch fails are
    /// left untouched. Rejected outright in simulated mode.
    pub async fn refresh_all_real(&self) -> Result<RefreshAllOutcome, AppError> {
        if self.mode != DataSourceMode::RealApi {
            return Err(AppError::RealDataUnavailable(
                "data source is simulated; configure ALPHAVANTAGE_API_KEY".to_string(),
            ));
        }

        let attempts = self.universe.iter().map(|symbol| async move {
            match self.source.fetch(symbol).await {
                Ok(quote) => {
                    let snapshot = self.apply_quote(symbol, &quote);
                    tracing::info!(symbol = %symbol, price = snapshot.price, "refreshed with real quote");
                    true
                }
                Err(err) => {
                    tracing::debug!(symbol = %symbol, %err, "refresh-all fetch skipped");
                    false
                }
            }
        });
        let refreshed = join_all(attempts).await.iter().filter(|ok| **ok).count();
        Ok(RefreshAllOutcome {
            refreshed,
            skipped: self.universe.len() - refreshed,
        })
    }

    /// Overwrite the snapshot from a fetched quote and append to history.
    fn apply_quote(&self, symbol: &str, quote: &Quote) -> Snapshot {
        let snapshot =
            self.cache
                .upsert(symbol, quote.price, quote.change, quote.change_percent);
        self.record_history(symbol, quote.price);
        snapshot
    }

    /// One synthetic step from the current cached price (or the seed price
    /// when the symbol has never been cached).
    fn simulated_update(&self, symbol: &str) -> Snapshot {
        let old_price = self
            .cache
            .get(symbol)
            .map(|s| s.price)
            .unwrap_or_else(|| seed_price(symbol));
        let new_price = self
            .generator
            .next_price(&mut rand::rng(), old_price);
        let change = new_price - old_price;
        let snapshot = self
            .cache
            .upsert(symbol, new_price, change, percent_change(old_price, new_price));
        self.record_history(symbol, new_price);
        tracing::debug!(
            symbol = %symbol,
            price = new_price,
            change_percent = snapshot.change_percent,
            "simulated update"
        );
        snapshot
    }

    /// A history write failure is logged and swallowed: the snapshot remains
    /// the source of truth for live reads and the refresh still counts as
    /// successful.
    fn record_history(&self, symbol: &str, price: f64) {
        if let Err(err) = self.history.append(symbol, price) {
            tracing::error!(symbol = %symbol, %err, "history append failed");
        }
    }

    // Read side, delegating to the cache and the history log.

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.cache.get_all()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<Snapshot> {
        self.cache.get(&symbol.trim().to_ascii_uppercase())
    }

    pub fn history(&self, symbol: &str, limit: usize) -> Result<Vec<HistoryRecord>, AppError> {
        self.history
            .recent_by_symbol(&symbol.trim().to_ascii_uppercase(), limit)
    }

    pub fn analytics(&self, symbol: &str) -> Result<Option<SymbolAnalytics>, AppError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let records = self.history.all_by_symbol(&symbol)?;
        Ok(analytics::compute(&symbol, &records))
    }

    pub fn storage_stats(&self) -> Result<HistoryStats, AppError> {
        self.history.stats()
    }

    pub fn data_source_info(&self) -> DataSourceInfo {
        let api_configured = self.source.is_configured();
        let message = match self.mode {
            DataSourceMode::RealApi => {
                "Connected to Alpha Vantage - live market data, one real fetch per cycle".to_string()
            }
            DataSourceMode::Simulated => {
                "Using simulated data - set ALPHAVANTAGE_API_KEY for live market data".to_string()
            }
        };
        DataSourceInfo {
            mode: self.mode,
            api_configured,
            tracked_symbols: self.universe.len(),
            symbols: self.universe.clone(),
            message,
        }
    }
}
