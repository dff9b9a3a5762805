use std::env;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. None runs the in-memory store.
    pub database_url: Option<String>,

    // FounderShield risk verification
    pub foundershield_url: String,
    pub foundershield_api_key: Option<String>,

    /// Max concurrent risk-verification calls per collection run.
    pub risk_concurrency: usize,
    /// Per-call timeout for the risk service, seconds.
    pub risk_timeout_secs: u64,

    /// Default lookback window for collection runs, days.
    pub days_back: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a value fails to parse.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            foundershield_url: env::var("FOUNDERSHIELD_URL")
                .unwrap_or_else(|_| "https://api.foundershield.io".to_string()),
            foundershield_api_key: env::var("FOUNDERSHIELD_API_KEY").ok(),
            risk_concurrency: parsed_env("RISK_CONCURRENCY", 4),
            risk_timeout_secs: parsed_env("RISK_TIMEOUT_SECS", 10),
            days_back: parsed_env("DAYS_BACK", 7),
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {v:?}")),
        Err(_) => default,
    }
}
