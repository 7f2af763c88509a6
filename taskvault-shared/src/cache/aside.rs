/// Read-through and write-invalidate operations over a [`CacheStore`]

use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, CacheStore, PutError};

/// An entity that can be cached under `"<ENTITY>:<id>"`
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync {
    /// Key prefix, e.g. `task`
    const ENTITY: &'static str;

    fn cache_id(&self) -> i32;
}

/// Cache key for an entity id
///
/// # Example
///
/// ```
/// use taskvault_shared::cache::aside::cache_key;
/// use taskvault_shared::models::task::Task;
///
/// assert_eq!(cache_key::<Task>(42), "task:42");
/// ```
pub fn cache_key<T: Cacheable>(id: i32) -> String {
    format!("{}:{}", T::ENTITY, id)
}

/// Where a read was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Store,
}

/// A value returned by [`EntityCache::get`]
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    pub fn from_cache(&self) -> bool {
        self.source == Source::Cache
    }
}

/// Cache-aside operations shared by every request handler
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl EntityCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Underlying store, for health checks
    pub fn cache_store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// Read-through lookup
    ///
    /// A snapshot that is present and parses is returned as-is, with no
    /// freshness check against the store. Otherwise `load` runs; a found
    /// entity is written back with the configured TTL. Loader errors and
    /// absent rows both yield None and cache nothing.
    ///
    /// Authorization is the caller's job and must run on the returned value
    /// whatever its [`Source`].
    pub async fn get<T, F, Fut, E>(&self, id: i32, load: F) -> Option<Fetched<T>>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Display,
    {
        let key = cache_key::<T>(id);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    return Some(Fetched { value, source: Source::Cache });
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry"),
            },
            Ok(None) => tracing::debug!(key = %key, "Cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to store"),
        }

        let value = match load().await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Store lookup failed");
                return None;
            }
        };

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set_ex(&key, &raw, self.ttl).await {
                    tracing::warn!(key = %key, error = %e, "Failed to populate cache");
                }
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry"),
        }

        Some(Fetched { value, source: Source::Store })
    }

    /// Runs an authoritative write, then replaces the entity's snapshot
    ///
    /// The cache is only touched after `write` succeeds, and a cache failure
    /// never undoes the write. See [`EntityCache::store`] for which cache
    /// failures are returned.
    pub async fn put<T, Fut, E>(&self, write: Fut) -> Result<T, PutError<E>>
    where
        T: Cacheable,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = write.await.map_err(PutError::Store)?;
        self.store(&value).await.map_err(PutError::Cache)?;
        Ok(value)
    }

    /// Replaces the snapshot of an entity that was just written
    ///
    /// Deletes the key, then sets the fresh snapshot. Serialization errors
    /// are returned; store failures are logged only.
    pub async fn store<T: Cacheable>(&self, value: &T) -> Result<(), CacheError> {
        let key = cache_key::<T>(value.cache_id());
        let raw = serde_json::to_string(value)?;

        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Failed to invalidate cache entry");
        }
        if let Err(e) = self.store.set_ex(&key, &raw, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to refresh cache entry");
        }

        Ok(())
    }

    /// Populates snapshots for a batch, failing on the first error of any kind
    pub async fn store_all<T: Cacheable>(&self, values: &[T]) -> Result<(), CacheError> {
        for value in values {
            let key = cache_key::<T>(value.cache_id());
            let raw = serde_json::to_string(value)?;
            self.store.set_ex(&key, &raw, self.ttl).await?;
        }
        Ok(())
    }

    /// Deletes an entity's snapshot; never fails
    pub async fn invalidate<T: Cacheable>(&self, id: i32) {
        let key = cache_key::<T>(id);
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Failed to invalidate cache entry");
        }
    }
}
