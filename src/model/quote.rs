use serde::Serialize;

/// A quote as parsed from the provider payload: the three numeric fields the
/// refresh path depends on.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}
