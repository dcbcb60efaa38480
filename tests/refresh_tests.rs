use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use stockboard::alphavantage::QuoteSource;
use stockboard::cache::PriceCache;
use stockboard::error::{AppError, FetchError};
use stockboard::history::HistoryLog;
use stockboard::model::Quote;
use stockboard::refresh::{DataSourceMode, RefreshOrchestrator};

/// Scripted quote source: pops pre-loaded outcomes per symbol and records
/// every fetch call. Fetches with no scripted outcome fail with a provider
/// error, which exercises the fallback path.
struct ScriptedSource {
    configured: bool,
    script: Mutex<HashMap<String, VecDeque<Result<Quote, FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn real() -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn simulated() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, symbol: &str, outcome: Result<Quote, FetchError>) {
        self.script
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .push_back(outcome);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl QuoteSource for ScriptedSource {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.calls.lock().unwrap().push(symbol.to_string());
        self.script
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(FetchError::Provider("no scripted outcome".to_string())))
    }
}

fn quote(price: f64, change: f64, change_percent: f64) -> Quote {
    Quote {
        price,
        change,
        change_percent,
    }
}

fn orchestrator(
    source: Arc<ScriptedSource>,
    symbols: &[&str],
    dir: &tempfile::TempDir,
) -> RefreshOrchestrator<Arc<ScriptedSource>> {
    RefreshOrchestrator::new(
        source,
        symbols.iter().map(|s| s.to_string()).collect(),
        Arc::new(PriceCache::new()),
        Arc::new(HistoryLog::new(dir.path().join("history.sqlite"))),
    )
}

/// Verifies simulated-mode seeding: every symbol gets its static base price
/// (100.0 for unlisted symbols), no fetch is attempted, and the seed price
/// lands in both cache and history.
#[tokio::test]
async fn seed_simulated_uses_static_price_table() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAPL", "GOOGL", "ZZZZ"], &dir);

    assert_eq!(orch.mode(), DataSourceMode::Simulated);
    orch.seed().await;

    assert!(source.calls().is_empty());
    assert!((orch.snapshot("AAPL").unwrap().price - 150.0).abs() < f64::EPSILON);
    assert!((orch.snapshot("GOOGL").unwrap().price - 2700.0).abs() < f64::EPSILON);
    assert!((orch.snapshot("ZZZZ").unwrap().price - 100.0).abs() < f64::EPSILON);

    let newest = &orch.history("AAPL", 1).unwrap()[0];
    assert!((newest.price - 150.0).abs() < f64::EPSILON);
}

/// Verifies real-mode seeding: a successful fetch seeds with the real quote,
/// a failed fetch falls back to the static table, same rule as steady state.
#[tokio::test]
async fn seed_real_mixes_fetched_and_fallback_prices() {
    let source = ScriptedSource::real();
    source.push("AAPL", Ok(quote(123.45, 1.5, 1.23)));
    // MSFT has no scripted outcome, so its seed fetch fails.
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAPL", "MSFT"], &dir);

    assert_eq!(orch.mode(), DataSourceMode::RealApi);
    orch.seed().await;

    let aapl = orch.snapshot("AAPL").unwrap();
    assert!((aapl.price - 123.45).abs() < f64::EPSILON);
    assert!((aapl.change - 1.5).abs() < f64::EPSILON);
    assert!((orch.snapshot("MSFT").unwrap().price - 300.0).abs() < f64::EPSILON);
    assert_eq!(source.calls(), vec!["AAPL".to_string(), "MSFT".to_string()]);
}

/// Verifies the core consistency invariant: after any cycle, every tracked
/// symbol has a snapshot whose price equals the newest history record, and
/// the change fields agree with the step that produced it.
#[tokio::test]
async fn cycle_keeps_cache_and_history_consistent() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(source, &["AAPL", "MSFT", "TSLA"], &dir);
    orch.seed().await;

    for _ in 0..3 {
        let before: HashMap<String, f64> = orch
            .snapshots()
            .into_iter()
            .map(|s| (s.symbol.clone(), s.price))
            .collect();

        let snapshots = orch.run_cycle().await;
        assert_eq!(snapshots.len(), 3);

        for symbol in ["AAPL", "MSFT", "TSLA"] {
            let snapshot = orch.snapshot(symbol).unwrap();
            let newest = &orch.history(symbol, 1).unwrap()[0];
            assert!(
                (snapshot.price - newest.price).abs() < f64::EPSILON,
                "{} cache and history disagree",
                symbol
            );

            let old = before[symbol];
            assert!((snapshot.change - (snapshot.price - old)).abs() < 1e-9);
            assert!(snapshot.price > 0.0);
            // One simulated step stays within the drift bound of the old price.
            assert!(snapshot.price >= old * 0.96 - 0.01);
            assert!(snapshot.price <= old * 1.04 + 0.01);
        }
    }
}

/// Verifies round-robin designation: across 7 cycles over a 3-symbol
/// universe the fetch sequence is a fixed rotation (counts 3/2/2), and a
/// mid-sequence success does not perturb it.
#[tokio::test]
async fn round_robin_rotation_independent_of_outcomes() {
    let source = ScriptedSource::real();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAA", "BBB", "CCC"], &dir);
    orch.seed().await;
    source.clear_calls();

    // BBB succeeds on its first designation; everything else fails.
    source.push("BBB", Ok(quote(42.0, 0.0, 0.0)));

    for _ in 0..7 {
        orch.run_cycle().await;
    }

    let calls = source.calls();
    assert_eq!(
        calls,
        ["AAA", "BBB", "CCC", "AAA", "BBB", "CCC", "AAA"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    );
    assert_eq!(calls.iter().filter(|c| *c == "AAA").count(), 3);
    assert_eq!(calls.iter().filter(|c| *c == "BBB").count(), 2);
    assert_eq!(calls.iter().filter(|c| *c == "CCC").count(), 2);
}

/// Verifies fallback determinism: when the designated symbol's fetch fails,
/// its snapshot still updates via a simulated step in the same cycle.
#[tokio::test]
async fn designated_fetch_failure_still_updates_snapshot() {
    let source = ScriptedSource::real();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAA"], &dir);
    orch.seed().await;

    let seeded = orch.snapshot("AAA").unwrap();
    source.push("AAA", Err(FetchError::RateLimited));
    orch.run_cycle().await;

    let refreshed = orch.snapshot("AAA").unwrap();
    assert!(refreshed.last_updated >= seeded.last_updated);
    // Seed + one cycle: two history records, newest matching the cache.
    let history = orch.history("AAA", 10).unwrap();
    assert_eq!(history.len(), 2);
    assert!((history[0].price - refreshed.price).abs() < f64::EPSILON);
    assert!(refreshed.price >= seeded.price * 0.96 - 0.01);
    assert!(refreshed.price <= seeded.price * 1.04 + 0.01);
}

/// Verifies a successful real fetch overwrites price and both change fields
/// from the quote verbatim.
#[tokio::test]
async fn real_fetch_success_overwrites_snapshot_from_quote() {
    let source = ScriptedSource::real();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAA"], &dir);
    orch.seed().await;

    source.push("AAA", Ok(quote(555.5, 2.5, 0.45)));
    orch.run_cycle().await;

    let snapshot = orch.snapshot("AAA").unwrap();
    assert!((snapshot.price - 555.5).abs() < f64::EPSILON);
    assert!((snapshot.change - 2.5).abs() < f64::EPSILON);
    assert!((snapshot.change_percent - 0.45).abs() < f64::EPSILON);
    assert!((orch.history("AAA", 1).unwrap()[0].price - 555.5).abs() < f64::EPSILON);
}

/// Verifies refresh-all-with-real-data is rejected outright in simulated
/// mode.
#[tokio::test]
async fn refresh_all_real_rejected_in_simulated_mode() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(source, &["AAPL"], &dir);
    orch.seed().await;

    let err = orch.refresh_all_real().await.unwrap_err();
    assert!(matches!(err, AppError::RealDataUnavailable(_)));
}

/// Verifies refresh-all updates the symbols whose fetch succeeds and leaves
/// failed ones completely untouched.
#[tokio::test]
async fn refresh_all_real_applies_successes_only() {
    let source = ScriptedSource::real();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAA", "BBB"], &dir);
    orch.seed().await;

    let bbb_before = orch.snapshot("BBB").unwrap();
    source.push("AAA", Ok(quote(200.0, 1.0, 0.5)));
    let outcome = orch.refresh_all_real().await.unwrap();

    assert_eq!(outcome.refreshed, 1);
    assert_eq!(outcome.skipped, 1);
    assert!((orch.snapshot("AAA").unwrap().price - 200.0).abs() < f64::EPSILON);

    let bbb_after = orch.snapshot("BBB").unwrap();
    assert!((bbb_after.price - bbb_before.price).abs() < f64::EPSILON);
    assert_eq!(bbb_after.last_updated, bbb_before.last_updated);
}

/// Verifies manual single-symbol refresh: unknown symbols report None, and
/// in simulated mode the refresh never touches the quote source.
#[tokio::test]
async fn refresh_one_unknown_is_none_and_simulated_skips_source() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::clone(&source), &["AAPL"], &dir);
    orch.seed().await;

    assert!(orch.refresh_one("ZZZZ").await.is_none());

    let refreshed = orch.refresh_one("aapl").await.expect("tracked symbol");
    assert_eq!(refreshed.symbol, "AAPL");
    assert!(source.calls().is_empty());
}

/// Verifies the fire-and-continue handle: a spawned refresh completes and
/// updates shared state even though the caller only joins afterwards.
#[tokio::test]
async fn spawn_refresh_one_runs_to_completion() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    let orch = Arc::new(orchestrator(source, &["AAPL"], &dir));
    orch.seed().await;

    let before = orch.history("AAPL", 10).unwrap().len();
    let handle = orch.spawn_refresh_one("AAPL".to_string());
    let snapshot = handle.await.unwrap().expect("tracked symbol");

    assert_eq!(snapshot.symbol, "AAPL");
    assert_eq!(orch.history("AAPL", 10).unwrap().len(), before + 1);
    assert!((orch.snapshot("AAPL").unwrap().price - snapshot.price).abs() < f64::EPSILON);
}

/// Verifies a history write failure is masked: the cycle still refreshes
/// every snapshot even though nothing can be persisted.
#[tokio::test]
async fn history_failure_does_not_abort_cycle() {
    let source = ScriptedSource::simulated();
    let dir = tempfile::tempdir().unwrap();
    // Pointing the log at a directory makes every open fail.
    let orch = RefreshOrchestrator::new(
        source,
        vec!["AAPL".to_string(), "MSFT".to_string()],
        Arc::new(PriceCache::new()),
        Arc::new(HistoryLog::new(dir.path())),
    );
    orch.seed().await;

    let snapshots = orch.run_cycle().await;
    assert_eq!(snapshots.len(), 2);
    assert!(orch.snapshot("AAPL").unwrap().price > 0.0);
    assert!(orch.history("AAPL", 10).is_err());
}
