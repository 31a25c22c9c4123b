//! Log updates - folding a new attempt into the stored log.

use tracing::trace;

use crate::domain::{AttemptLog, LogEntry, WindowLimits};

/// Record one attempt at `now`.
///
/// The attempt is coalesced into the tail entry when the tail was opened
/// less than `inner_window_log_duration_seconds` ago; otherwise a new entry
/// is appended. The tail's timestamp never moves on coalesce.
pub fn record_attempt(log: &mut AttemptLog, limits: &WindowLimits, now: i64) {
    let recent_threshold = now.saturating_sub(limits.inner_window_log_duration_seconds);

    if let Some(tail) = log
        .tail_mut()
        .filter(|tail| tail.timestamp > recent_threshold)
    {
        tail.count = tail.count.saturating_add(1);
        trace!(timestamp = tail.timestamp, count = tail.count, "Coalesced attempt into tail");
        return;
    }

    log.push(LogEntry::opened_at(now));
    trace!(timestamp = now, entries = log.len(), "Appended log entry");
}

/// Drop entries that can no longer fall inside the outer window.
///
/// The tail always survives so later coalescing decisions are unaffected.
pub fn prune_expired(log: &mut AttemptLog, limits: &WindowLimits, now: i64) -> usize {
    let outer_start = now.saturating_sub(limits.outer_window_duration_seconds);
    log.prune_through(outer_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> WindowLimits {
        WindowLimits {
            outer_window_duration_seconds: 10,
            max_outer_window_request_count: 3,
            inner_window_log_duration_seconds: 5,
            inner_window_block_duration_seconds: 5,
            max_inner_window_request_count: 2,
        }
    }

    #[test]
    fn test_attempts_inside_log_duration_coalesce() {
        let mut log = AttemptLog::starting_at(0);
        for now in 1..=4 {
            record_attempt(&mut log, &limits(), now);
        }
        assert_eq!(log.entries(), &[LogEntry { timestamp: 0, count: 5 }]);
    }

    #[test]
    fn test_gap_of_log_duration_appends() {
        let mut log = AttemptLog::starting_at(0);
        record_attempt(&mut log, &limits(), 5);
        assert_eq!(
            log.entries(),
            &[
                LogEntry { timestamp: 0, count: 1 },
                LogEntry { timestamp: 5, count: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_log_gets_initial_entry() {
        let mut log = AttemptLog::default();
        record_attempt(&mut log, &limits(), 7);
        assert_eq!(log.entries(), &[LogEntry::opened_at(7)]);
    }

    #[test]
    fn test_only_tail_is_touched() {
        let mut log = AttemptLog::from_entries(vec![
            LogEntry { timestamp: 0, count: 2 },
            LogEntry { timestamp: 6, count: 1 },
        ]);
        record_attempt(&mut log, &limits(), 8);
        assert_eq!(log.entries()[0], LogEntry { timestamp: 0, count: 2 });
        assert_eq!(log.entries()[1], LogEntry { timestamp: 6, count: 2 });
    }

    #[test]
    fn test_prune_expired_uses_outer_window() {
        let mut log = AttemptLog::from_entries(vec![
            LogEntry { timestamp: 0, count: 2 },
            LogEntry { timestamp: 6, count: 1 },
            LogEntry { timestamp: 12, count: 1 },
        ]);
        assert_eq!(prune_expired(&mut log, &limits(), 12), 1);
        assert_eq!(log.len(), 2);
    }
}
