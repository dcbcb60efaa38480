use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::alphavantage::QuoteSource;
use crate::model::Snapshot;
use crate::refresh::RefreshOrchestrator;

/// Periodic trigger plus fan-out: every `period` the orchestrator runs one
/// cycle and the resulting snapshot set is broadcast to subscribers. Slow or
/// absent subscribers never block the loop; they just miss frames.
pub fn spawn_scheduler<S>(
    orchestrator: Arc<RefreshOrchestrator<S>>,
    period: Duration,
    feed_tx: broadcast::Sender<Vec<Snapshot>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: QuoteSource + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; the seed pass already
        // populated the cache, so skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshots = orchestrator.run_cycle().await;
                    tracing::debug!(count = snapshots.len(), "cycle complete, broadcasting");
                    let _ = feed_tx.send(snapshots);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }
    })
}
