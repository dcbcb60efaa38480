use serde::Serialize;

/// One immutable price observation, appended on every refresh and retained
/// for the life of the store.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub symbol: String,
    pub price: f64,
    pub timestamp_ms: i64,
}
