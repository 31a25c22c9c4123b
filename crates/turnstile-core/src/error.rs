//! Limiter-level error types.

use thiserror::Error;

use crate::ports::StoreError;

/// Errors surfaced by the limiter entry points.
#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("Invalid window limits: {0}")]
    InvalidLimits(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Gave up on key {key} after {attempts} conflicting writes")]
    Contention { key: String, attempts: u32 },
}
