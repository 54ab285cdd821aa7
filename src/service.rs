use crate::{
    alloc::SequenceAllocator,
    cache::Cache,
    codec,
    error::ShortenError,
    models::ShortMapping,
    store::Store,
};
use std::{sync::Arc, time::Duration};
use url::Url;

/// Create/read/update/delete on code → URL mappings, run cache-aside: the
/// durable store is written or read first, then the cache is primed or
/// evicted, so any crash window leaves the cache behind the store at worst.
///
/// The one exception is the resolve fast path, where a cache hit is
/// authoritative for the URL itself while the store stays the counter of
/// record.
pub struct Shortener {
    store: Store,
    cache: Arc<dyn Cache>,
    allocator: SequenceAllocator,
    cache_ttl: Duration,
}

impl Shortener {
    pub fn new(
        store: Store,
        cache: Arc<dyn Cache>,
        allocator: SequenceAllocator,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            allocator,
            cache_ttl,
        }
    }

    /// Shorten `target_url`: allocate a sequence number, encode it, persist
    /// the mapping, prime the cache.
    ///
    /// Validation happens before allocation, and allocation before the store
    /// write, so a failure at any step leaves no partial record behind.
    pub async fn create(&self, target_url: &str) -> Result<ShortMapping, ShortenError> {
        let target_url = validate_target(target_url)?;

        let sequence = self.allocator.next_sequence().await?;
        let code = codec::encode(sequence);
        tracing::info!("allocated sequence {sequence} -> code '{code}'");

        let now = chrono::Utc::now().naive_utc();
        let mapping = ShortMapping {
            code,
            target_url,
            created_at: now,
            updated_at: now,
            access_count: 0,
        };

        self.store.save(&mapping).await?;
        self.prime_cache(&mapping.code, &mapping.target_url).await;

        Ok(mapping)
    }

    /// Resolve a code to its target URL and count the access.
    ///
    /// Cache hit: the cached URL is returned and the store's counter is
    /// bumped, keeping the authoritative count correct. Cache miss (or a
    /// failing cache, which degrades to a store read): the store is
    /// consulted, the counter bumped, and the cache re-primed.
    pub async fn resolve(&self, code: &str) -> Result<String, ShortenError> {
        // Issued codes are always base-62, so anything else can never exist.
        if codec::decode(code).is_err() {
            return Err(ShortenError::NotFound);
        }

        match self.cache.get(code).await {
            Ok(Some(target_url)) => {
                self.store.increment_access_count(code).await?;
                return Ok(target_url);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("cache read failed for '{code}', falling back to store: {e:#}");
            }
        }

        let mapping = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(ShortenError::NotFound)?;

        self.store.increment_access_count(code).await?;
        self.prime_cache(&mapping.code, &mapping.target_url).await;

        Ok(mapping.target_url)
    }

    /// Repoint an existing code at a new target. Resets the access counter
    /// and overwrites (not merely evicts) the cache entry, so the very next
    /// read already sees the new URL.
    pub async fn update(&self, code: &str, new_target_url: &str) -> Result<(), ShortenError> {
        let new_target_url = validate_target(new_target_url)?;

        let now = chrono::Utc::now().naive_utc();
        let updated = self.store.update_target(code, &new_target_url, now).await?;
        if !updated {
            return Err(ShortenError::NotFound);
        }

        self.prime_cache(code, &new_target_url).await;
        Ok(())
    }

    /// Delete a mapping. Store first, cache second: a crash between the two
    /// leaves a stale cache entry that dies with its TTL, never a record the
    /// store still claims to own.
    pub async fn delete(&self, code: &str) -> Result<(), ShortenError> {
        let deleted = self.store.delete_by_code(code).await?;
        if !deleted {
            return Err(ShortenError::NotFound);
        }

        if let Err(e) = self.cache.delete(code).await {
            tracing::warn!("cache eviction failed for deleted code '{code}': {e:#}");
        }
        Ok(())
    }

    /// Authoritative access count, straight from the store.
    pub async fn stats(&self, code: &str) -> Result<i64, ShortenError> {
        let mapping = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(ShortenError::NotFound)?;
        Ok(mapping.access_count)
    }

    /// Write-through to the cache after a successful store write. The cache
    /// is not authoritative, so a failure here is logged for operators and
    /// otherwise ignored.
    async fn prime_cache(&self, code: &str, target_url: &str) {
        if let Err(e) = self.cache.set(code, target_url, self.cache_ttl).await {
            tracing::warn!("cache populate failed for '{code}': {e:#}");
        }
    }
}

/// Accept only absolute URLs with a scheme and a host.
fn validate_target(raw: &str) -> Result<String, ShortenError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ShortenError::InvalidInput("URL must not be empty".into()));
    }

    let parsed =
        Url::parse(raw).map_err(|e| ShortenError::InvalidInput(format!("not a valid URL: {e}")))?;
    if !parsed.has_host() {
        return Err(ShortenError::InvalidInput(
            "URL must be absolute with a host".into(),
        ));
    }

    Ok(raw.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        coordination::{Coordinator, LocalCoordinator},
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

    async fn memory_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn allocator(coordinator: Arc<dyn Coordinator>) -> SequenceAllocator {
        SequenceAllocator::new(coordinator, "/shorten", 100_000, 1, Duration::from_secs(2))
    }

    async fn shortener_with_cache(cache: Arc<dyn Cache>) -> (Shortener, SqlitePool) {
        let pool = memory_pool().await;
        let coord = Arc::new(LocalCoordinator::new(Duration::from_secs(30)));
        let shortener = Shortener::new(
            Store::new(pool.clone()),
            cache,
            allocator(coord),
            Duration::from_secs(60),
        );
        (shortener, pool)
    }

    async fn shortener() -> (Shortener, SqlitePool) {
        shortener_with_cache(Arc::new(MemoryCache::new())).await
    }

    async fn mapping_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM mappings")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let (shortener, _pool) = shortener().await;

        let mapping = shortener.create("https://example.org").await.unwrap();
        assert_eq!(mapping.code, codec::encode(100_001));
        assert_eq!(mapping.access_count, 0);

        let url = shortener.resolve(&mapping.code).await.unwrap();
        assert_eq!(url, "https://example.org");
    }

    #[tokio::test]
    async fn consecutive_creates_get_distinct_codes() {
        let (shortener, _pool) = shortener().await;

        let a = shortener.create("https://example.org/a").await.unwrap();
        let b = shortener.create("https://example.org/b").await.unwrap();
        assert_ne!(a.code, b.code);

        assert_eq!(
            shortener.resolve(&a.code).await.unwrap(),
            "https://example.org/a"
        );
        assert_eq!(
            shortener.resolve(&b.code).await.unwrap(),
            "https://example.org/b"
        );
    }

    #[tokio::test]
    async fn every_resolution_counts_cache_hits_included() {
        let (shortener, _pool) = shortener().await;
        let mapping = shortener.create("https://example.org").await.unwrap();

        // First resolve hits the cache primed by create; the next two hit it
        // again. All three must land on the store's counter.
        for _ in 0..3 {
            shortener.resolve(&mapping.code).await.unwrap();
        }

        assert_eq!(shortener.stats(&mapping.code).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn resolve_falls_back_to_store_when_cache_is_cold() {
        let (shortener, _pool) = shortener().await;
        let mapping = shortener.create("https://example.org").await.unwrap();

        // Simulate a restarted (empty) cache.
        shortener.cache.delete(&mapping.code).await.unwrap();

        assert_eq!(
            shortener.resolve(&mapping.code).await.unwrap(),
            "https://example.org"
        );
        assert_eq!(shortener.stats(&mapping.code).await.unwrap(), 1);

        // The miss re-primed the cache; verify by resolving again.
        assert_eq!(
            shortener.cache.get(&mapping.code).await.unwrap().as_deref(),
            Some("https://example.org")
        );
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (shortener, _pool) = shortener().await;
        assert!(matches!(
            shortener.resolve("zzzz").await,
            Err(ShortenError::NotFound)
        ));
        assert!(matches!(
            shortener.stats("zzzz").await,
            Err(ShortenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_swaps_the_url_and_resets_the_counter() {
        let (shortener, _pool) = shortener().await;
        let mapping = shortener.create("https://example.org").await.unwrap();

        shortener.resolve(&mapping.code).await.unwrap();
        assert_eq!(shortener.stats(&mapping.code).await.unwrap(), 1);

        shortener
            .update(&mapping.code, "https://example.net")
            .await
            .unwrap();

        // The cache entry was overwritten, so the new URL is immediately
        // visible without a store round-trip.
        assert_eq!(
            shortener.cache.get(&mapping.code).await.unwrap().as_deref(),
            Some("https://example.net")
        );
        assert_eq!(
            shortener.resolve(&mapping.code).await.unwrap(),
            "https://example.net"
        );
        // One resolve since the update.
        assert_eq!(shortener.stats(&mapping.code).await.unwrap(), 1);

        let stored = shortener
            .store
            .find_by_code(&mapping.code)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.updated_at >= mapping.updated_at);
    }

    #[tokio::test]
    async fn update_of_unknown_code_is_not_found() {
        let (shortener, _pool) = shortener().await;
        assert!(matches!(
            shortener.update("zzzz", "https://example.org").await,
            Err(ShortenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn deleted_code_resolves_and_deletes_as_not_found() {
        let (shortener, _pool) = shortener().await;
        let mapping = shortener.create("https://example.org").await.unwrap();

        shortener.delete(&mapping.code).await.unwrap();

        assert!(matches!(
            shortener.resolve(&mapping.code).await,
            Err(ShortenError::NotFound)
        ));
        // Repeated delete reports NotFound instead of blowing up.
        assert!(matches!(
            shortener.delete(&mapping.code).await,
            Err(ShortenError::NotFound)
        ));
        // The cache entry went with it.
        assert_eq!(shortener.cache.get(&mapping.code).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected_before_any_side_effect() {
        let (shortener, pool) = shortener().await;

        for bad in ["", "   ", "not a url", "/relative/path", "mailto:x"] {
            assert!(
                matches!(
                    shortener.create(bad).await,
                    Err(ShortenError::InvalidInput(_))
                ),
                "expected rejection for {bad:?}"
            );
        }

        assert_eq!(mapping_count(&pool).await, 0);
    }

    /// Cache whose every operation fails, standing in for an unreachable
    /// backend.
    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_the_store_instead_of_failing() {
        let (shortener, _pool) = shortener_with_cache(Arc::new(BrokenCache)).await;

        // Create succeeds even though the cache populate fails.
        let mapping = shortener.create("https://example.org").await.unwrap();

        // Resolve degrades to a store read.
        assert_eq!(
            shortener.resolve(&mapping.code).await.unwrap(),
            "https://example.org"
        );
        assert_eq!(shortener.stats(&mapping.code).await.unwrap(), 1);

        // Update and delete still succeed; only the cache side is lossy.
        shortener
            .update(&mapping.code, "https://example.net")
            .await
            .unwrap();
        shortener.delete(&mapping.code).await.unwrap();
    }

    #[tokio::test]
    async fn allocation_timeout_persists_nothing() {
        let pool = memory_pool().await;
        let coord = Arc::new(LocalCoordinator::new(Duration::from_secs(30)));

        // Another process holds the lock and never lets go within our bound.
        assert!(coord
            .acquire_lock("/shorten/lock", Duration::ZERO)
            .await
            .unwrap());

        let shortener = Shortener::new(
            Store::new(pool.clone()),
            Arc::new(MemoryCache::new()),
            SequenceAllocator::new(
                coord.clone(),
                "/shorten",
                100_000,
                1,
                Duration::from_millis(20),
            ),
            Duration::from_secs(60),
        );

        assert!(matches!(
            shortener.create("https://example.org").await,
            Err(ShortenError::AllocationTimeout)
        ));
        assert_eq!(mapping_count(&pool).await, 0);
    }
}
