use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Key/value cache consumed by the resolver. Never the system of record:
/// every entry is reconstructible from the durable store, so implementations
/// are free to drop data at any time.
///
/// All operations are fallible so the caller can apply its degrade-and-log
/// policy instead of this layer guessing at one.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Thread-safe in-memory cache mapping short code → target URL.
///
/// Backed by a DashMap so reads are concurrent and lock-free for most cases.
/// Each entry carries its expiry instant; expired entries are dropped lazily
/// on the next read rather than by a sweeper task.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: DashMap<String, (String, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.inner.get(key) {
            let (value, expires_at) = entry.value();
            if *expires_at > Instant::now() {
                return Ok(Some(value.clone()));
            }
        } else {
            return Ok(None);
        }

        // Entry was present but past its TTL.
        self.inner.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner
            .insert(key.to_owned(), (value.to_owned(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(key);
        Ok(())
    }
}
