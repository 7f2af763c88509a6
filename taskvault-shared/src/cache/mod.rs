/// Cache-aside layer for users and tasks
///
/// The relational store is always authoritative. The cache keeps JSON
/// snapshots under `"<entity>:<id>"` keys (`task:7`, `user:3`) with a fixed
/// TTL, and is consulted before the store on single-entity reads.
///
/// # Architecture
///
/// ```text
/// handler ──get──> EntityCache ──hit──> snapshot
///                      │
///                      └─miss──> loader (SQL) ──> SETEX key ttl
///
/// handler ──put──> write (SQL) ──ok──> DEL key, SETEX key ttl
/// ```
///
/// A [`CacheStore`] is either Redis ([`crate::redis::client::RedisClient`]) or
/// the in-process [`MemoryCache`].
///
/// # Consistency
///
/// Store writes and cache updates are not atomic. A reader that misses
/// between a committed write and the following cache overwrite may
/// repopulate the key with the pre-write row, which then lives until the TTL
/// runs out. This window is accepted.
///
/// # Failure Handling
///
/// - Read path: any cache failure (unreachable, corrupt entry) is a miss
/// - Write path: store-unavailability is logged and ignored, serialization
///   failures are returned
/// - [`EntityCache::store_all`]: every failure is returned
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskvault_shared::cache::{EntityCache, MemoryCache};
/// use taskvault_shared::models::task::Task;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) {
/// let cache = EntityCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(3600));
///
/// if let Some(fetched) = cache.get(7, || Task::find_by_id(&pool, 7)).await {
///     println!("task {} from {:?}", fetched.value.id, fetched.source);
/// }
/// # }
/// ```

pub mod aside;
pub mod store;

pub use aside::{Cacheable, EntityCache, Fetched, Source};
pub use store::{CacheStore, MemoryCache};

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Entity could not be converted to or from JSON
    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store unreachable or command failed
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Error type for [`EntityCache::put`]
#[derive(Debug, thiserror::Error)]
pub enum PutError<E> {
    /// The authoritative write failed; the cache was not touched
    #[error("{0}")]
    Store(E),

    /// The write committed but the snapshot could not be cached
    #[error(transparent)]
    Cache(CacheError),
}
