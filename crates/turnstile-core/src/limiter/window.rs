//! Window evaluation - turns a stored log into block flags.

use serde::{Deserialize, Serialize};

use crate::domain::{AttemptLog, WindowLimits};

/// Which windows currently block a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatus {
    /// The burst cap was hit and its cooldown has not elapsed.
    pub inner_blocked: bool,
    /// The aggregate cap over the outer window was reached.
    pub outer_blocked: bool,
}

impl WindowStatus {
    pub fn is_blocked(&self) -> bool {
        self.inner_blocked || self.outer_blocked
    }
}

/// Evaluate both windows for `log` at time `now`.
///
/// Only entries strictly newer than `now - outer_window_duration_seconds`
/// count. The burst cooldown is anchored to the timestamp of the entry that
/// reached the cap, so a key that goes quiet still serves out its block.
pub fn evaluate(log: &AttemptLog, limits: &WindowLimits, now: i64) -> WindowStatus {
    let outer_start = now.saturating_sub(limits.outer_window_duration_seconds);

    let mut status = WindowStatus::default();
    let mut total: u64 = 0;
    let mut recent = None;
    for entry in log.since(outer_start) {
        total += u64::from(entry.count);
        recent = Some(entry);
    }

    let Some(recent) = recent else {
        return status;
    };

    if recent.count >= limits.max_inner_window_request_count {
        let block_end = recent
            .timestamp
            .saturating_add(limits.inner_window_block_duration_seconds);
        status.inner_blocked = now < block_end;
    }

    status.outer_blocked = total >= u64::from(limits.max_outer_window_request_count);

    status
}
