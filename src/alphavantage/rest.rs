use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::AlphaVantageConfig;
use crate::error::FetchError;
use crate::model::Quote;

use super::QuoteSource;

const PLACEHOLDER_API_KEY: &str = "demo";

/// Per-symbol minimum-interval gate over outbound calls.
///
/// The check and the timestamp update happen under one lock so two
/// concurrent callers for the same symbol can never both pass the gate.
pub struct RateGate {
    min_interval: Duration,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Record a call for `symbol` and return true iff the window since the
    /// previous recorded call has elapsed. Denied calls leave the recorded
    /// timestamp untouched.
    pub fn try_acquire(&self, symbol: &str) -> bool {
        let mut last = self.last_call.lock().unwrap();
        let now = Instant::now();
        match last.get(symbol) {
            Some(prev) if now.duration_since(*prev) < self.min_interval => false,
            _ => {
                last.insert(symbol.to_string(), now);
                true
            }
        }
    }
}

/// Alpha Vantage GLOBAL_QUOTE client. Stateless apart from the HTTP client
/// and the rate gate; safe to call repeatedly.
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    gate: RateGate,
}

impl AlphaVantageClient {
    pub fn new(config: &AlphaVantageConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            gate: RateGate::new(Duration::from_secs(config.rate_limit_secs)),
        }
    }

    fn compact_error_body(body: &str) -> String {
        let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.len() > 180 {
            format!("{}...", &normalized[..180])
        } else {
            normalized
        }
    }
}

impl QuoteSource for AlphaVantageClient {
    fn is_configured(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }

    async fn fetch(&self, symbol: &str) -> Result<Quote, FetchError> {
        if !self.gate.try_acquire(symbol) {
            return Err(FetchError::RateLimited);
        }

        tracing::debug!(symbol, "fetching quote from Alpha Vantage");
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Throttled("HTTP 429".to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let root: Value = response.json().await?;
        if let Some(note) = root.get("Note").and_then(Value::as_str) {
            return Err(FetchError::Throttled(Self::compact_error_body(note)));
        }
        if let Some(msg) = root.get("Error Message").and_then(Value::as_str) {
            return Err(FetchError::Provider(Self::compact_error_body(msg)));
        }

        let quote = root
            .get("Global Quote")
            .ok_or_else(|| FetchError::Parse("missing 'Global Quote' object".to_string()))?;
        parse_global_quote(quote)
    }
}

/// Parse the `Global Quote` object into the three fields the refresh path
/// needs. Alpha Vantage quotes numbers as strings; the percent field carries
/// a trailing `%`. A non-positive price is rejected here so downstream code
/// only ever caches positive prices.
pub fn parse_global_quote(quote: &Value) -> Result<Quote, FetchError> {
    let price = numeric_field(quote, "05. price")?;
    if price <= 0.0 {
        return Err(FetchError::Parse(format!("non-positive price {}", price)));
    }
    Ok(Quote {
        price,
        change: numeric_field(quote, "09. change")?,
        change_percent: numeric_field(quote, "10. change percent")?,
    })
}

fn numeric_field(quote: &Value, key: &str) -> Result<f64, FetchError> {
    let value = quote
        .get(key)
        .ok_or_else(|| FetchError::Parse(format!("missing field '{}'", key)))?;
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| FetchError::Parse(format!("field '{}' is not a string or number", key)))?;
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| FetchError::Parse(format!("non-numeric field '{}': '{}'", key, raw)))
}
