use async_trait::async_trait;

use crate::domain::{AttemptLog, AttemptRecord};

/// Attempt store trait - abstraction over storage backends (Redis, in-memory).
///
/// Writes always replace the whole log; there is no partial update.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Load the record for a key, if one exists.
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError>;

    /// Overwrite the log for a key unconditionally, returning the new version.
    async fn set(&self, key: &str, log: &AttemptLog) -> Result<u64, StoreError>;

    /// Overwrite the log only if the stored version still matches.
    ///
    /// `expected_version` of `None` means the key must not exist yet.
    /// Returns the new version, or `None` when another writer got there first.
    async fn compare_and_set(
        &self,
        key: &str,
        log: &AttemptLog,
        expected_version: Option<u64>,
    ) -> Result<Option<u64>, StoreError>;

    /// Remove a key, returning what was stored under it.
    async fn delete(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError>;
}

/// Attempt store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
