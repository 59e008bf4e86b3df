//! Three-tier cache in front of every upstream call.
//!
//! Lookup order is fastest first:
//!
//! - T1: bounded in-process map ([`MemoryTier`])
//! - T2: optional shared store with native TTL ([`SharedStore`], Redis)
//! - T3: durable SQLite table ([`CacheDb`])
//!
//! A hit in T2 or T3 is promoted into T1 with a short TTL. Writes go to every
//! enabled tier. Tiers are independent: an I/O error in one tier is logged and
//! treated as a miss (reads) or skipped (writes) without affecting the others.

pub mod connection;
pub mod entries;
pub mod key;
pub mod memory;
pub mod migrations;
pub mod shared;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use key::{compose_key, namespace_of};
pub use memory::MemoryTier;
pub use shared::{RedisStore, SharedStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock, add_duration, remaining};
use crate::codec::Codec;
use crate::config::AppConfig;

/// Sizing for the in-process tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierOptions {
    pub memory_capacity: usize,
    /// TTL for entries promoted into T1 from a slower tier.
    pub promotion_ttl: Duration,
}

impl Default for TierOptions {
    fn default() -> Self {
        Self { memory_capacity: 1000, promotion_ttl: Duration::from_secs(300) }
    }
}

impl TierOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { memory_capacity: config.memory_capacity, promotion_ttl: config.promotion_ttl() }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStats {
    pub t1_items: usize,
    pub t1_capacity: usize,
    /// `None` when the durable tier could not be counted.
    pub t3_items: Option<u64>,
    pub shared_enabled: bool,
    pub memory_hits: u64,
    pub shared_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    /// Number of durable tier lookups performed.
    pub durable_reads: u64,
}

/// Outcome of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CleanupReport {
    pub memory_removed: usize,
    pub durable_removed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    shared_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    durable_reads: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The tiered cache.
///
/// Construct once at startup and share behind an `Arc`.
pub struct TieredCache {
    memory: MemoryTier,
    shared: Option<Arc<dyn SharedStore>>,
    durable: CacheDb,
    clock: Arc<dyn Clock>,
    promotion_ttl: Duration,
    counters: Counters,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("memory", &self.memory)
            .field("shared_enabled", &self.shared.is_some())
            .field("durable", &self.durable)
            .field("promotion_ttl", &self.promotion_ttl)
            .finish()
    }
}

impl TieredCache {
    /// Create a cache over an opened durable tier, with no shared tier.
    pub fn new(durable: CacheDb, options: TierOptions) -> Self {
        Self {
            memory: MemoryTier::new(options.memory_capacity),
            shared: None,
            durable,
            clock: Arc::new(SystemClock),
            promotion_ttl: options.promotion_ttl,
            counters: Counters::default(),
        }
    }

    /// Enable the shared tier.
    pub fn with_shared(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.shared = Some(store);
        self
    }

    /// Replace the clock used for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the cache described by `config`.
    ///
    /// The durable tier must open, so a bad `db_path` fails here rather than on
    /// every call. An unreachable shared tier is logged and left disabled.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let durable = CacheDb::open(&config.db_path).await?;
        tracing::info!(path = %config.db_path.display(), "Durable cache tier opened");

        let mut cache = Self::new(durable, TierOptions::from_config(config));

        if config.shared_store_enabled {
            match RedisStore::connect(&config.shared_store_url).await {
                Ok(store) => cache = cache.with_shared(Arc::new(store)),
                Err(e) => tracing::warn!(error = %e, "Shared cache tier unavailable; continuing without it"),
            }
        }

        Ok(cache)
    }

    pub fn shared_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Get the raw bytes stored under `key`.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.lookup(key, |bytes| Ok(bytes.clone())).await
    }

    /// Get and decode the value stored under `key`.
    ///
    /// A value that fails to decode counts as a miss for the tier it came from
    /// and is left in place.
    pub async fn get_decoded<T, C>(&self, key: &str, codec: &C) -> Option<T>
    where
        T: DeserializeOwned,
        C: Codec,
    {
        self.lookup(key, |bytes| codec.decode(bytes)).await
    }

    async fn lookup<T>(&self, key: &str, decode: impl Fn(&Bytes) -> Result<T, Error>) -> Option<T> {
        let now = self.clock.now();

        if let Some(bytes) = self.memory.get(key, now) {
            match decode(&bytes) {
                Ok(value) => {
                    Counters::bump(&self.counters.memory_hits);
                    tracing::debug!(key, tier = "memory", "Cache hit");
                    return Some(value);
                }
                Err(e) => tracing::warn!(key, tier = "memory", error = %e, "Undecodable cached value"),
            }
        }

        if let Some(shared) = &self.shared {
            match shared.get(key).await {
                Ok(Some(bytes)) => match decode(&bytes) {
                    Ok(value) => {
                        self.memory.insert(key, bytes, add_duration(now, self.promotion_ttl), now);
                        Counters::bump(&self.counters.shared_hits);
                        tracing::debug!(key, tier = "shared", "Cache hit");
                        return Some(value);
                    }
                    Err(e) => tracing::warn!(key, tier = "shared", error = %e, "Undecodable cached value"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(key, tier = "shared", error = %e, "Cache tier read failed"),
            }
        }

        Counters::bump(&self.counters.durable_reads);
        match self.durable.get_entry(key).await {
            Ok(Some(entry)) if entry.is_fresh(now) => match decode(&entry.value) {
                Ok(value) => {
                    let ttl = self.promotion_ttl.min(remaining(now, entry.expires_at));
                    self.memory.insert(key, entry.value, add_duration(now, ttl), now);
                    Counters::bump(&self.counters.durable_hits);
                    tracing::debug!(key, tier = "durable", "Cache hit");
                    return Some(value);
                }
                Err(e) => tracing::warn!(key, tier = "durable", error = %e, "Undecodable cached value"),
            },
            Ok(Some(_)) => {
                if let Err(e) = self.durable.delete_expired_entry(key, now).await {
                    tracing::warn!(key, tier = "durable", error = %e, "Failed to drop expired entry");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key, tier = "durable", error = %e, "Cache tier read failed"),
        }

        Counters::bump(&self.counters.misses);
        None
    }

    /// Store `value` under `key` in every enabled tier.
    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        let now = self.clock.now();
        let expires_at = add_duration(now, ttl);

        self.memory.insert(key, value.clone(), expires_at, now);

        // A zero TTL is already expired, and SETEX would round it up to 1s.
        if let Some(shared) = &self.shared {
            let written = if ttl.is_zero() {
                shared.del(key).await
            } else {
                shared.set_ex(key, shared::ttl_secs(ttl), value.clone()).await
            };
            if let Err(e) = written {
                tracing::warn!(key, tier = "shared", error = %e, "Cache tier write failed");
            }
        }

        let entry = CacheEntry { key: key.to_string(), value, expires_at, created_at: now };
        if let Err(e) = self.durable.put_entry(&entry).await {
            tracing::warn!(key, tier = "durable", error = %e, "Cache tier write failed");
        }
    }

    /// Encode `value` with `codec` and store it in every enabled tier.
    ///
    /// # Errors
    ///
    /// Returns `Error::Codec` if encoding fails. Tier write failures are logged, not returned.
    pub async fn set_encoded<T, C>(&self, key: &str, value: &T, ttl: Duration, codec: &C) -> Result<(), Error>
    where
        T: Serialize,
        C: Codec,
    {
        let bytes = codec.encode(value)?;
        self.set(key, bytes, ttl).await;
        Ok(())
    }

    /// Remove `key` from every tier.
    pub async fn delete(&self, key: &str) {
        self.memory.remove(key);

        if let Some(shared) = &self.shared
            && let Err(e) = shared.del(key).await
        {
            tracing::warn!(key, tier = "shared", error = %e, "Cache tier delete failed");
        }

        if let Err(e) = self.durable.delete_entry(key).await {
            tracing::warn!(key, tier = "durable", error = %e, "Cache tier delete failed");
        }
    }

    /// Empty every tier. The shared tier is flushed as a whole database.
    pub async fn clear(&self) {
        self.memory.clear();

        if let Some(shared) = &self.shared
            && let Err(e) = shared.flush().await
        {
            tracing::warn!(tier = "shared", error = %e, "Cache tier clear failed");
        }

        if let Err(e) = self.durable.clear_entries().await {
            tracing::warn!(tier = "durable", error = %e, "Cache tier clear failed");
        }
    }

    /// Empty the in-process tier only.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    /// Sweep expired entries from T1 and T3. T2 expires entries natively.
    pub async fn cleanup_expired(&self) -> CleanupReport {
        let now = self.clock.now();
        let memory_removed = self.memory.purge_expired(now);

        let durable_removed = match self.durable.purge_expired_entries(now).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(tier = "durable", error = %e, "Cache tier sweep failed");
                0
            }
        };

        CleanupReport { memory_removed, durable_removed }
    }

    pub async fn get_statistics(&self) -> CacheStats {
        let t3_items = match self.durable.count_entries().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(tier = "durable", error = %e, "Failed to count durable entries");
                None
            }
        };

        CacheStats {
            t1_items: self.memory.len(),
            t1_capacity: self.memory.capacity(),
            t3_items,
            shared_enabled: self.shared_enabled(),
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            shared_hits: self.counters.shared_hits.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            durable_reads: self.counters.durable_reads.load(Ordering::Relaxed),
        }
    }

    /// Close the durable tier connection.
    pub async fn close(self) -> Result<(), Error> {
        self.durable.close().await
    }
}

/// Run `cleanup_expired` every `every` until the returned handle is aborted.
pub fn spawn_cleanup(cache: Arc<TieredCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = cache.cleanup_expired().await;
            tracing::debug!(
                memory_removed = report.memory_removed,
                durable_removed = report.durable_removed,
                "Expired cache entries swept"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::JsonCodec;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;

    /// In-memory stand-in for Redis with a failure switch.
    #[derive(Default)]
    struct FakeShared {
        values: Mutex<HashMap<String, Bytes>>,
        broken: AtomicBool,
        flushes: AtomicU64,
    }

    impl FakeShared {
        fn check(&self) -> Result<(), Error> {
            if self.broken.load(Ordering::SeqCst) {
                Err(Error::SharedStore("connection refused".into()))
            } else {
                Ok(())
            }
        }

        fn contains(&self, key: &str) -> bool {
            self.values.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl SharedStore for FakeShared {
        async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
            self.check()?;
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_ex(&self, key: &str, _ttl_secs: u64, value: Bytes) -> Result<(), Error> {
            self.check()?;
            self.values.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<(), Error> {
            self.check()?;
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn flush(&self) -> Result<(), Error> {
            self.check()?;
            self.flushes.fetch_add(1, Ordering::SeqCst);
            self.values.lock().unwrap().clear();
            Ok(())
        }
    }

    async fn test_cache(clock: Arc<ManualClock>) -> TieredCache {
        let durable = CacheDb::open_in_memory().await.unwrap();
        TieredCache::new(durable, TierOptions::default()).with_clock(clock)
    }

    fn bob() -> serde_json::Value {
        serde_json::json!({"level": 90})
    }

    #[tokio::test]
    async fn test_set_then_get_until_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;

        cache.set("character:acct:Bob", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        assert_eq!(cache.get("character:acct:Bob").await, Some(Bytes::from_static(b"v")));

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get("character:acct:Bob").await, None);
    }

    #[tokio::test]
    async fn test_expired_durable_row_is_deleted_on_read() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(10)).await;
        clock.advance(Duration::from_secs(11));

        assert!(cache.get("k").await.is_none());
        assert!(cache.durable.get_entry("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_read_racing_a_write_keeps_the_write() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;

        cache.set("k", Bytes::from_static(b"old"), Duration::from_secs(10)).await;
        clock.advance(Duration::from_secs(11));
        cache.clear_memory();

        let (read, ()) =
            tokio::join!(cache.get("k"), cache.set("k", Bytes::from_static(b"new"), Duration::from_secs(3600)));
        assert_ne!(read, Some(Bytes::from_static(b"old")));

        let row = cache.durable.get_entry("k").await.unwrap().unwrap();
        assert_eq!(&row.value[..], b"new");

        cache.clear_memory();
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;
        let now = clock.now();

        cache
            .durable
            .put_entry(&CacheEntry {
                key: "k".into(),
                value: Bytes::from_static(b"v"),
                expires_at: now + chrono::Duration::seconds(3600),
                created_at: now,
            })
            .await
            .unwrap();

        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));
        assert_eq!(cache.get_statistics().await.durable_reads, 1);

        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));
        let stats = cache.get_statistics().await;
        assert_eq!(stats.durable_reads, 1);
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.t1_items, 1);
    }

    #[tokio::test]
    async fn test_promotion_never_outlives_source_entry() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(30)).await;
        cache.clear_memory();
        assert!(cache.get("k").await.is_some());

        clock.advance(Duration::from_secs(31));
        assert!(cache.memory.get("k", clock.now()).is_none());
    }

    #[tokio::test]
    async fn test_cleared_memory_is_served_from_durable() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock).await;

        cache
            .set_encoded("char:acct:Bob", &bob(), Duration::from_secs(3600), &JsonCodec)
            .await
            .unwrap();
        let first: serde_json::Value = cache.get_decoded("char:acct:Bob", &JsonCodec).await.unwrap();
        assert_eq!(first, bob());

        cache.clear_memory();
        assert_eq!(cache.get_statistics().await.t1_items, 0);

        let second: serde_json::Value = cache.get_decoded("char:acct:Bob", &JsonCodec).await.unwrap();
        assert_eq!(second, bob());
        assert_eq!(cache.get_statistics().await.t1_items, 1);
    }

    #[tokio::test]
    async fn test_shared_hit_is_promoted() {
        let clock = Arc::new(ManualClock::default());
        let shared = Arc::new(FakeShared::default());
        shared.set_ex("k", 60, Bytes::from_static(b"remote")).await.unwrap();
        let cache = test_cache(clock.clone()).await.with_shared(shared);

        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"remote")));
        assert_eq!(cache.memory.get("k", clock.now()), Some(Bytes::from_static(b"remote")));

        let stats = cache.get_statistics().await;
        assert_eq!(stats.shared_hits, 1);
        assert_eq!(stats.durable_reads, 0);
    }

    #[tokio::test]
    async fn test_writes_reach_every_tier() {
        let clock = Arc::new(ManualClock::default());
        let shared = Arc::new(FakeShared::default());
        let cache = test_cache(clock.clone()).await.with_shared(shared.clone());

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60)).await;

        assert!(cache.memory.get("k", clock.now()).is_some());
        assert!(shared.contains("k"));
        assert!(cache.durable.get_entry("k").await.unwrap().is_some());

        cache.delete("k").await;
        assert!(cache.memory.get("k", clock.now()).is_none());
        assert!(!shared.contains("k"));
        assert!(cache.durable.get_entry("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_broken_shared_tier_is_isolated() {
        let clock = Arc::new(ManualClock::default());
        let shared = Arc::new(FakeShared::default());
        shared.broken.store(true, Ordering::SeqCst);
        let cache = test_cache(clock).await.with_shared(shared);

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));

        cache.clear_memory();
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));

        cache.delete("k").await;
        assert!(cache.get("k").await.is_none());

        cache.set("other", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        cache.clear().await;
        assert!(cache.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_reaches_shared_tier() {
        let clock = Arc::new(ManualClock::default());
        let shared = Arc::new(FakeShared::default());
        let cache = test_cache(clock).await.with_shared(shared.clone());

        cache.set("k", Bytes::from_static(b"live"), Duration::from_secs(60)).await;
        cache.set("k", Bytes::from_static(b"dead"), Duration::ZERO).await;

        assert!(!shared.contains("k"));
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.get_statistics().await.t1_items, 0);
    }

    #[tokio::test]
    async fn test_closed_durable_tier_is_isolated() {
        let clock = Arc::new(ManualClock::default());
        let durable = CacheDb::open_in_memory().await.unwrap();
        let cache = TieredCache::new(durable.clone(), TierOptions::default()).with_clock(clock);
        durable.close().await.unwrap();

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));

        cache.clear_memory();
        assert!(cache.get("k").await.is_none());

        assert_eq!(cache.cleanup_expired().await, CleanupReport::default());
        cache.delete("k").await;
        cache.clear().await;

        let stats = cache.get_statistics().await;
        assert_eq!(stats.t3_items, None);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss_and_kept() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock).await;

        cache.set("k", Bytes::from_static(b"\xffnot json"), Duration::from_secs(60)).await;

        let decoded: Option<serde_json::Value> = cache.get_decoded("k", &JsonCodec).await;
        assert!(decoded.is_none());
        assert!(cache.get("k").await.is_some());
        assert!(cache.durable.get_entry("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_flushes_shared_tier() {
        let clock = Arc::new(ManualClock::default());
        let shared = Arc::new(FakeShared::default());
        let cache = test_cache(clock).await.with_shared(shared.clone());

        cache.set("a", Bytes::from_static(b"1"), Duration::from_secs(60)).await;
        cache.set("b", Bytes::from_static(b"2"), Duration::from_secs(60)).await;
        cache.clear().await;

        assert_eq!(shared.flushes.load(Ordering::SeqCst), 1);
        let stats = cache.get_statistics().await;
        assert_eq!(stats.t1_items, 0);
        assert_eq!(stats.t3_items, Some(0));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sweeps_memory_and_durable() {
        let clock = Arc::new(ManualClock::default());
        let cache = test_cache(clock.clone()).await;

        cache.set("short", Bytes::from_static(b"1"), Duration::from_secs(10)).await;
        cache.set("long", Bytes::from_static(b"2"), Duration::from_secs(600)).await;
        clock.advance(Duration::from_secs(11));

        let report = cache.cleanup_expired().await;
        assert_eq!(report, CleanupReport { memory_removed: 1, durable_removed: 1 });

        let stats = cache.get_statistics().await;
        assert_eq!(stats.t1_items, 1);
        assert_eq!(stats.t3_items, Some(1));
    }

    #[tokio::test]
    async fn test_spawn_cleanup_runs_periodically() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(test_cache(clock.clone()).await);

        cache.set("short", Bytes::from_static(b"1"), Duration::from_secs(10)).await;
        clock.advance(Duration::from_secs(11));

        let handle = spawn_cleanup(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert_eq!(cache.get_statistics().await.t3_items, Some(0));
    }

    #[tokio::test]
    async fn test_durable_tier_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");

        let cache = TieredCache::new(CacheDb::open(&path).await.unwrap(), TierOptions::default());
        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        cache.close().await.unwrap();

        let reopened = TieredCache::new(CacheDb::open(&path).await.unwrap(), TierOptions::default());
        assert_eq!(reopened.get("k").await, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_from_config_degrades_without_shared_tier() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("cache.sqlite"),
            shared_store_enabled: true,
            shared_store_url: "not-a-redis-url".into(),
            ..Default::default()
        };

        let cache = TieredCache::from_config(&config).await.unwrap();
        assert!(!cache.shared_enabled());

        cache.set("k", Bytes::from_static(b"v"), Duration::from_secs(60)).await;
        assert!(cache.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_from_config_fails_fast_on_bad_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { db_path: dir.path().join("missing").join("cache.sqlite"), ..Default::default() };

        assert!(TieredCache::from_config(&config).await.is_err());
    }
}
