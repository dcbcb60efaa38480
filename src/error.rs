use thiserror::Error;

/// Failure causes for one outbound quote fetch attempt.
///
/// `RateLimited` and `Throttled` are expected outcomes, not faults: the
/// orchestrator answers them with a simulated fallback and logs at debug.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited: within the per-symbol call window")]
    RateLimited,

    #[error("provider throttled: {0}")]
    Throttled(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed quote payload: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Throttled(_))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("real-data refresh unavailable: {0}")]
    RealDataUnavailable(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}
