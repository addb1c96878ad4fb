//! Key-value cache used for signed playlists and taste vectors.
//!
//! The cache is an optimisation only: callers go through [`get_or_miss`] and
//! [`set_best_effort`], which turn every cache failure into a logged miss.

mod memory;

pub use memory::InMemoryCache;

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// `GET key` / `SETEX key ttl value` semantics.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError>;
}

pub async fn get_or_miss(cache: &dyn KeyValueCache, key: &str) -> Option<String> {
    match cache.get(key).await {
        Ok(value) => value,
        Err(err) => {
            warn!("Cache read for {} failed, treating as miss: {}", key, err);
            None
        }
    }
}

pub async fn set_best_effort(cache: &dyn KeyValueCache, key: &str, ttl: Duration, value: String) {
    if let Err(err) = cache.set_ex(key, ttl, value).await {
        warn!("Cache write for {} failed: {}", key, err);
    }
}
