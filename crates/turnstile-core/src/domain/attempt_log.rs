use serde::{Deserialize, Serialize};

/// One coalesced group of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Epoch seconds at which the entry was opened.
    pub timestamp: i64,
    /// Attempts folded into this entry, always at least 1.
    pub count: u32,
}

impl LogEntry {
    /// Open a fresh entry holding a single attempt.
    pub fn opened_at(timestamp: i64) -> Self {
        Self {
            timestamp,
            count: 1,
        }
    }
}

/// Per-key history of attempts, ascending by timestamp.
///
/// Only the tail entry is ever mutated. Everything before it is frozen once
/// a newer entry has been appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    entries: Vec<LogEntry>,
}

impl AttemptLog {
    /// Log for a key seen for the first time at `now`.
    pub fn starting_at(now: i64) -> Self {
        Self {
            entries: vec![LogEntry::opened_at(now)],
        }
    }

    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry regardless of age.
    pub fn tail(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Entries strictly newer than `after`, in log order.
    pub fn since(&self, after: i64) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| entry.timestamp > after)
    }

    /// Sum of counts over entries strictly newer than `after`.
    pub fn total_since(&self, after: i64) -> u64 {
        self.since(after).map(|entry| u64::from(entry.count)).sum()
    }

    pub(crate) fn tail_mut(&mut self) -> Option<&mut LogEntry> {
        self.entries.last_mut()
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Drop entries at or before `cutoff`, always keeping the tail.
    ///
    /// Returns how many entries were removed.
    pub(crate) fn prune_through(&mut self, cutoff: i64) -> usize {
        let Some(last) = self.entries.len().checked_sub(1) else {
            return 0;
        };
        let before = self.entries.len();
        let mut index = 0;
        self.entries.retain(|entry| {
            let keep = index == last || entry.timestamp > cutoff;
            index += 1;
            keep
        });
        before - self.entries.len()
    }
}

/// A stored log together with its key and write version.
///
/// `version` starts at 1 on creation and increases on every write; stores
/// use it for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub key: String,
    pub log: AttemptLog,
    pub version: u64,
}
