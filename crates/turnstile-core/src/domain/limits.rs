use serde::{Deserialize, Serialize};

use crate::error::LimiterError;

/// Caller-supplied limits for one admission decision.
///
/// There are no defaults: different routes or key classes are expected to
/// pass different limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimits {
    /// Span of the aggregate-cap window.
    pub outer_window_duration_seconds: i64,
    /// Attempts allowed inside the outer window before blocking.
    pub max_outer_window_request_count: u32,
    /// Gap under which a new attempt is folded into the tail entry.
    pub inner_window_log_duration_seconds: i64,
    /// Cooldown once a single entry reaches the burst cap.
    pub inner_window_block_duration_seconds: i64,
    /// Attempts a single entry may hold before the burst window blocks.
    pub max_inner_window_request_count: u32,
}

impl WindowLimits {
    /// Reject limits with any non-positive field.
    pub fn validate(&self) -> Result<(), LimiterError> {
        let durations = [
            ("outer_window_duration_seconds", self.outer_window_duration_seconds),
            (
                "inner_window_log_duration_seconds",
                self.inner_window_log_duration_seconds,
            ),
            (
                "inner_window_block_duration_seconds",
                self.inner_window_block_duration_seconds,
            ),
        ];
        for (field, value) in durations {
            if value <= 0 {
                return Err(LimiterError::InvalidLimits(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }

        let counts = [
            ("max_outer_window_request_count", self.max_outer_window_request_count),
            ("max_inner_window_request_count", self.max_inner_window_request_count),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(LimiterError::InvalidLimits(format!(
                    "{field} must be positive"
                )));
            }
        }

        Ok(())
    }
}
