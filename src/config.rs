use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub alphavantage: AlphaVantageConfig,
    pub refresh: RefreshConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlphaVantageConfig {
    pub base_url: String,
    pub rate_limit_secs: u64,
    #[serde(skip)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    pub cycle_secs: u64,
    pub symbols: Vec<String>,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl RefreshConfig {
    /// The tracked universe: configured symbols uppercased, trimmed and
    /// deduplicated, in configuration order.
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;

        // The API key is optional: an absent or placeholder key selects
        // simulated mode instead of failing startup.
        config.alphavantage.api_key = std::env::var("ALPHAVANTAGE_API_KEY").unwrap_or_default();

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh.tracked_symbols().is_empty() {
            bail!("refresh.symbols must list at least one ticker symbol");
        }
        if self.refresh.cycle_secs == 0 {
            bail!("refresh.cycle_secs must be > 0");
        }
        if self.alphavantage.rate_limit_secs == 0 {
            bail!("alphavantage.rate_limit_secs must be > 0");
        }
        Ok(())
    }
}
