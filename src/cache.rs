use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::Snapshot;

/// Thread-safe map of symbol to its live snapshot.
///
/// All operations copy in or out under the lock; callers never hold
/// references into the map, so a returned snapshot is a point-in-time value
/// unaffected by later upserts.
#[derive(Default)]
pub struct PriceCache {
    inner: RwLock<HashMap<String, Snapshot>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every snapshot, sorted by symbol.
    pub fn get_all(&self) -> Vec<Snapshot> {
        let map = self.inner.read().unwrap();
        let mut all: Vec<Snapshot> = map.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn get(&self, symbol: &str) -> Option<Snapshot> {
        self.inner.read().unwrap().get(symbol).cloned()
    }

    /// Replace all price fields together and stamp `last_updated`; creates
    /// the snapshot on first call for a symbol. Returns the stored value.
    pub fn upsert(&self, symbol: &str, price: f64, change: f64, change_percent: f64) -> Snapshot {
        let snapshot = Snapshot {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            last_updated: Utc::now(),
        };
        let mut map = self.inner.write().unwrap();
        map.insert(symbol.to_string(), snapshot.clone());
        snapshot
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
