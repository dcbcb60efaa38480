use chrono::{DateTime, Utc};
use serde::Serialize;

/// The live, best-known state for one tracked symbol. Exactly one exists per
/// symbol in the price cache; every successful refresh replaces all price
/// fields together.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub last_updated: DateTime<Utc>,
}

/// Percent change from `old` to `new`, guarding the degenerate zero base:
/// an old price of 0 reports 0% rather than dividing by zero.
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        0.0
    } else {
        (new - old) / old * 100.0
    }
}

/// Round to 2 decimal places, the resolution prices are quoted at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
