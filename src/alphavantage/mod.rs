pub mod rest;

pub use rest::{AlphaVantageClient, RateGate};

use std::future::Future;
use std::sync::Arc;

use crate::error::FetchError;
use crate::model::Quote;

/// One rate-limited outbound fetch attempt per call. The orchestrator is
/// generic over this boundary so cycles can be driven by a scripted source
/// in tests.
pub trait QuoteSource {
    /// True only when a usable (non-empty, non-placeholder) credential is
    /// present. Decides the process-wide data-source mode once at startup.
    fn is_configured(&self) -> bool;

    /// Attempt one fetch for `symbol`. A call inside the per-symbol rate
    /// window returns `FetchError::RateLimited` without touching the network.
    fn fetch(&self, symbol: &str) -> impl Future<Output = Result<Quote, FetchError>> + Send;
}

impl<T: QuoteSource> QuoteSource for Arc<T> {
    fn is_configured(&self) -> bool {
        (**self).is_configured()
    }

    fn fetch(&self, symbol: &str) -> impl Future<Output = Result<Quote, FetchError>> + Send {
        (**self).fetch(symbol)
    }
}
