//! Attempt store implementations - Redis and in-memory fallback.

mod memory;

pub use memory::InMemoryAttemptStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisAttemptStore, RedisConfig};

#[cfg(feature = "redis")]
use std::sync::Arc;
#[cfg(feature = "redis")]
use turnstile_core::ports::{AttemptStore, StoreError};

/// Connect to Redis, falling back to the in-memory store when allowed.
#[cfg(feature = "redis")]
pub async fn connect_store(config: RedisConfig) -> Result<Arc<dyn AttemptStore>, StoreError> {
    let fallback = config.fallback_to_memory;
    match RedisAttemptStore::new(config).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if fallback => {
            tracing::error!(
                "Failed to connect to Redis: {}. Using in-memory attempt store.",
                e
            );
            Ok(Arc::new(InMemoryAttemptStore::new()))
        }
        Err(e) => Err(e),
    }
}
