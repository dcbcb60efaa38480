use serde::Serialize;

use crate::model::{percent_change, round2, HistoryRecord};

/// Read-side aggregation over one symbol's history. Computed on demand from
/// the full newest-first record list, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolAnalytics {
    pub symbol: String,
    pub current_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub data_points: usize,
    /// Current price minus the oldest recorded price.
    pub trend: f64,
    pub trend_direction: &'static str,
    /// Trend as a percentage of the oldest recorded price.
    pub price_change_percent: f64,
}

/// Aggregate `records` (newest first, as the history store returns them).
/// Returns `None` when there is no history for the symbol.
pub fn compute(symbol: &str, records: &[HistoryRecord]) -> Option<SymbolAnalytics> {
    let newest = records.first()?;
    let oldest = records.last()?;

    let current_price = newest.price;
    let mut min_price = current_price;
    let mut max_price = current_price;
    let mut sum = 0.0;
    for record in records {
        min_price = min_price.min(record.price);
        max_price = max_price.max(record.price);
        sum += record.price;
    }

    let trend = current_price - oldest.price;
    Some(SymbolAnalytics {
        symbol: symbol.to_string(),
        current_price,
        min_price: round2(min_price),
        max_price: round2(max_price),
        avg_price: round2(sum / records.len() as f64),
        data_points: records.len(),
        trend: round2(trend),
        trend_direction: if trend >= 0.0 { "up" } else { "down" },
        price_change_percent: round2(percent_change(oldest.price, current_price)),
    })
}
