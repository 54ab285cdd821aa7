use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./hop.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when rendering short links, e.g.
    /// "https://go.example.com". Must NOT have a trailing slash.
    pub base_url: String,

    /// Coordination-service path of the shared sequence counter. The
    /// allocation lock lives at "<counter_path>/lock".
    pub counter_path: String,

    /// Value the counter is seeded with on a fresh deployment. Starting well
    /// above zero keeps issued codes several symbols long from day one.
    pub counter_start: u64,

    /// How far the counter advances per allocation. 1 means one code per
    /// lock round-trip; larger values reserve a block at a time.
    pub allocation_step: u64,

    /// How long a single allocation may wait for the distributed lock.
    pub lock_timeout: Duration,

    /// Session TTL for the in-process coordinator's lock holds.
    pub lock_session: Duration,

    /// Time-to-live for cached code → URL entries.
    pub cache_ttl: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy
    /// before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let counter_start = std::env::var("COUNTER_START")
            .unwrap_or_else(|_| "100000".into())
            .parse::<u64>()
            .context("COUNTER_START must be a non-negative integer")?;

        let allocation_step = std::env::var("ALLOCATION_STEP")
            .unwrap_or_else(|_| "1".into())
            .parse::<u64>()
            .context("ALLOCATION_STEP must be a positive integer")?;
        if allocation_step == 0 {
            anyhow::bail!("ALLOCATION_STEP must be at least 1");
        }

        let lock_timeout_ms = std::env::var("LOCK_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse::<u64>()
            .context("LOCK_TIMEOUT_MS must be a duration in milliseconds")?;

        let lock_session_secs = std::env::var("LOCK_SESSION_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse::<u64>()
            .context("LOCK_SESSION_SECS must be a duration in seconds")?;

        let cache_ttl_hours = std::env::var("CACHE_TTL_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse::<u64>()
            .unwrap_or(24);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./hop.db".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            counter_path: std::env::var("COUNTER_PATH").unwrap_or_else(|_| "/shorten".into()),
            counter_start,
            allocation_step,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            lock_session: Duration::from_secs(lock_session_secs),
            cache_ttl: Duration::from_secs(cache_ttl_hours * 3600),
        })
    }
}
