/// Redis integration
///
/// Redis backs the cache-aside layer when `REDIS_URL` is configured. The
/// client implements [`crate::cache::CacheStore`], so handlers never talk to
/// Redis directly.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskvault_shared::cache::EntityCache;
/// use taskvault_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = RedisClient::new(RedisConfig::new("redis://localhost:6379")).await?;
/// let cache = EntityCache::new(Arc::new(client), Duration::from_secs(3600));
/// # Ok(())
/// # }
/// ```

pub mod client;
