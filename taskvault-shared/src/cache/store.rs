/// Key-value stores behind the cache-aside layer
///
/// Values are opaque strings with a per-key expiry. Two implementations
/// exist: Redis (see [`crate::redis::client::RedisClient`]) and the
/// in-process [`MemoryCache`], used when no Redis URL is configured and in
/// tests.

use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use super::CacheError;

/// String store with expiring keys
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value, or None if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Sets a value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Removes a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Reports whether the store is reachable
    async fn ping(&self) -> Result<bool, CacheError>;

    /// Short backend name for health output
    fn backend(&self) -> &'static str;
}

/// Entries held when no capacity is given
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
///
/// Overwriting a key restarts its clock, matching Redis `SETEX`.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: StdInstant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: StdInstant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache store backed by `moka`
///
/// Bounded by entry count; expired entries are evicted by moka's
/// housekeeping whether or not they are read again.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Number of live entries, after pending evictions have run
    pub async fn len(&self) -> usize {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.value.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value: Arc::from(value),
            ttl,
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn ping(&self) -> Result<bool, CacheError> {
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
