//! In-memory attempt store - used when Redis is unavailable and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use turnstile_core::domain::{AttemptLog, AttemptRecord};
use turnstile_core::ports::{AttemptStore, StoreError};

/// In-memory attempt store using a HashMap behind an async RwLock.
///
/// Note: limits are per-process and history is lost on restart.
pub struct InMemoryAttemptStore {
    store: RwLock<HashMap<String, AttemptRecord>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently holding history.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    fn write_record(store: &mut HashMap<String, AttemptRecord>, key: &str, log: &AttemptLog) -> u64 {
        let version = store.get(key).map_or(1, |record| record.version + 1);
        store.insert(
            key.to_string(),
            AttemptRecord {
                key: key.to_string(),
                log: log.clone(),
                version,
            },
        );
        version
    }
}

impl Default for InMemoryAttemptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
        let store = self.store.read().await;
        Ok(store.get(key).cloned())
    }

    async fn set(&self, key: &str, log: &AttemptLog) -> Result<u64, StoreError> {
        let mut store = self.store.write().await;
        Ok(Self::write_record(&mut store, key, log))
    }

    async fn compare_and_set(
        &self,
        key: &str,
        log: &AttemptLog,
        expected_version: Option<u64>,
    ) -> Result<Option<u64>, StoreError> {
        // Check and write under one lock so no writer can slip in between
        let mut store = self.store.write().await;
        let current = store.get(key).map(|record| record.version);
        if current != expected_version {
            tracing::debug!(key = %key, ?current, ?expected_version, "Version mismatch");
            return Ok(None);
        }
        Ok(Some(Self::write_record(&mut store, key, log)))
    }

    async fn delete(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
        let mut store = self.store.write().await;
        Ok(store.remove(key))
    }
}
