//! Application state and configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use murmur_core::{AggregateConfig, DashboardSnapshot, SqliteStore};
use parking_lot::RwLock;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8050").
    pub bind_addr: String,

    /// SQLite database written by the ingestion daemon.
    pub db_path: PathBuf,

    /// Trailing window aggregated on every refresh.
    pub window: Duration,

    /// Time-series bucket width.
    pub bucket_width: Duration,

    /// How often the snapshot is recomputed.
    pub refresh_interval: Duration,

    /// Number of hashtags to rank.
    pub top_hashtags: usize,

    /// Valid API tokens. Empty means the API is open.
    pub api_tokens: HashSet<String>,

    /// Metrics HTTP server port (0 to disable).
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `MURMUR_BIND_ADDR`: Server bind address (default: "0.0.0.0:8050")
    /// - `MURMUR_DB_PATH`: Database path (default: "./data/murmur.db")
    /// - `MURMUR_WINDOW_SECS`: Window length (default: 600)
    /// - `MURMUR_BUCKET_SECS`: Bucket width (default: 5)
    /// - `MURMUR_REFRESH_SECS`: Refresh interval (default: 60)
    /// - `MURMUR_TOP_HASHTAGS`: Hashtags to rank (default: 10)
    /// - `MURMUR_API_TOKENS`: Comma-separated list of API tokens
    /// - `MURMUR_METRICS_PORT`: Prometheus port (default: 0, disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        tracing::info!(
            bind_addr = %config.bind_addr,
            db_path = %config.db_path.display(),
            window_secs = config.window.as_secs(),
            bucket_secs = config.bucket_width.as_secs(),
            refresh_secs = config.refresh_interval.as_secs(),
            token_count = config.api_tokens.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("MURMUR_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8050".to_string());

        let db_path = lookup("MURMUR_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/murmur.db"));

        let window = secs(&lookup, "MURMUR_WINDOW_SECS", 600)?;
        let bucket_width = secs(&lookup, "MURMUR_BUCKET_SECS", 5)?;
        let refresh_interval = secs(&lookup, "MURMUR_REFRESH_SECS", 60)?;

        if bucket_width > window {
            anyhow::bail!(
                "MURMUR_BUCKET_SECS ({}) must not exceed MURMUR_WINDOW_SECS ({})",
                bucket_width.as_secs(),
                window.as_secs()
            );
        }

        let top_hashtags = number(&lookup, "MURMUR_TOP_HASHTAGS", 10usize)?;

        let api_tokens: HashSet<String> = lookup("MURMUR_API_TOKENS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let metrics_port = number(&lookup, "MURMUR_METRICS_PORT", 0u16)?;

        Ok(Self {
            bind_addr,
            db_path,
            window,
            bucket_width,
            refresh_interval,
            top_hashtags,
            api_tokens,
            metrics_port,
        })
    }

    /// Aggregation parameters derived from this configuration.
    pub fn aggregate(&self) -> AggregateConfig {
        AggregateConfig {
            window: self.window,
            bucket_width: self.bucket_width,
            top_hashtags: self.top_hashtags,
        }
    }
}

fn number<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = number(lookup, key, default)?;
    if value == 0 {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(Duration::from_secs(value))
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record store written by the ingestion daemon.
    pub store: Arc<SqliteStore>,

    /// Application configuration.
    pub config: Arc<Config>,

    /// Latest aggregation, replaced wholesale on every refresh.
    pub snapshot: Arc<RwLock<DashboardSnapshot>>,
}

impl AppState {
    /// Create state with an empty snapshot; the first refresh fills it.
    pub fn new(config: Config, store: Arc<SqliteStore>) -> Self {
        let snapshot = DashboardSnapshot::empty(Utc::now(), &config.aggregate());
        Self {
            store,
            config: Arc::new(config),
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8050");
        assert_eq!(config.window, Duration::from_secs(600));
        assert_eq!(config.bucket_width, Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.top_hashtags, 10);
        assert!(config.api_tokens.is_empty());
        assert_eq!(config.aggregate(), AggregateConfig::default());
    }

    #[test]
    fn test_overrides_and_tokens() {
        let config = Config::from_lookup(lookup(&[
            ("MURMUR_WINDOW_SECS", "300"),
            ("MURMUR_REFRESH_SECS", "15"),
            ("MURMUR_API_TOKENS", "abc, def,,"),
        ]))
        .unwrap();
        assert_eq!(config.window, Duration::from_secs(300));
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert_eq!(config.api_tokens.len(), 2);
        assert!(config.api_tokens.contains("def"));
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        assert!(Config::from_lookup(lookup(&[("MURMUR_WINDOW_SECS", "ten")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MURMUR_REFRESH_SECS", "0")])).is_err());
        assert!(
            Config::from_lookup(lookup(&[
                ("MURMUR_WINDOW_SECS", "5"),
                ("MURMUR_BUCKET_SECS", "10")
            ]))
            .is_err()
        );
    }
}
