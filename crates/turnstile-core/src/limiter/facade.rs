//! Limiter facade - the entry points callers use.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::domain::{AttemptLog, AttemptRecord, WindowLimits};
use crate::error::LimiterError;
use crate::ports::{AttemptStore, Clock};

use super::log_update;
use super::window::{self, WindowStatus};

/// What boolean entry points answer when no store is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnavailablePolicy {
    /// Admit the request.
    #[default]
    FailOpen,
    /// Reject the request.
    FailClosed,
}

/// Behavior switches for a [`Limiter`].
#[derive(Debug, Clone)]
pub struct LimiterOptions {
    pub unavailable_policy: UnavailablePolicy,
    /// Whether a dry-run check against an unseen key seeds its log.
    pub check_creates_record: bool,
    /// Drop entries older than the outer window whenever the log is written.
    pub prune_expired: bool,
    /// Extra read-evaluate-write rounds allowed after a conflicting write.
    pub max_write_conflicts: u32,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            unavailable_policy: UnavailablePolicy::FailOpen,
            check_creates_record: false,
            prune_expired: true,
            max_write_conflicts: 3,
        }
    }
}

/// Outcome of a single admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Blocked(WindowStatus),
    /// No store is configured, so nothing could be decided.
    Unavailable,
}

impl Admission {
    /// Collapse to a boolean, resolving `Unavailable` through `policy`.
    pub fn admitted_under(self, policy: UnavailablePolicy) -> bool {
        match self {
            Admission::Admitted => true,
            Admission::Blocked(_) => false,
            Admission::Unavailable => policy == UnavailablePolicy::FailOpen,
        }
    }
}

/// Window flags for a key, as reported by [`Limiter::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// The key has no stored history.
    Unseen,
    Tracked(WindowStatus),
    /// No store is configured, so nothing could be read.
    Unavailable,
}

/// Outcome of [`Limiter::forget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forgotten {
    /// The record that was stored under the key.
    Removed(AttemptRecord),
    NotFound,
    /// No store is configured, so nothing was deleted.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Record,
    Check,
}

/// Dual-window admission limiter over an injected attempt store.
///
/// Every call performs its own read-evaluate-write cycle; nothing is cached
/// between calls. Writes are conditional on the version that was read, so
/// concurrent callers on the same key never silently drop each other's
/// attempts.
#[derive(Clone)]
pub struct Limiter {
    store: Option<Arc<dyn AttemptStore>>,
    clock: Arc<dyn Clock>,
    options: LimiterOptions,
}

impl Limiter {
    pub fn new(store: Arc<dyn AttemptStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Some(store),
            clock,
            options: LimiterOptions::default(),
        }
    }

    /// A limiter with no backing store; every decision is `Unavailable`.
    pub fn without_store(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: None,
            clock,
            options: LimiterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LimiterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LimiterOptions {
        &self.options
    }

    /// Count an attempt against `key` if it is currently admitted.
    ///
    /// Returns `false` without recording when either window blocks.
    pub async fn record_and_check(
        &self,
        key: &str,
        limits: &WindowLimits,
    ) -> Result<bool, LimiterError> {
        let admission = self.record_attempt(key, limits).await?;
        Ok(admission.admitted_under(self.options.unavailable_policy))
    }

    /// Report whether `key` would be admitted, without counting an attempt.
    pub async fn check_only(&self, key: &str, limits: &WindowLimits) -> Result<bool, LimiterError> {
        let admission = self.check_attempt(key, limits).await?;
        Ok(admission.admitted_under(self.options.unavailable_policy))
    }

    /// Detailed form of [`Limiter::record_and_check`].
    pub async fn record_attempt(
        &self,
        key: &str,
        limits: &WindowLimits,
    ) -> Result<Admission, LimiterError> {
        self.limit_by_key(key, limits, Mode::Record).await
    }

    /// Detailed form of [`Limiter::check_only`].
    pub async fn check_attempt(
        &self,
        key: &str,
        limits: &WindowLimits,
    ) -> Result<Admission, LimiterError> {
        self.limit_by_key(key, limits, Mode::Check).await
    }

    /// Current window flags for `key`. Never writes.
    pub async fn status(&self, key: &str, limits: &WindowLimits) -> Result<KeyStatus, LimiterError> {
        limits.validate()?;
        let Some(store) = &self.store else {
            warn!(key = %key, "No attempt store configured");
            return Ok(KeyStatus::Unavailable);
        };

        let now = self.clock.now();
        Ok(match store.get(key).await? {
            Some(record) => KeyStatus::Tracked(window::evaluate(&record.log, limits, now)),
            None => KeyStatus::Unseen,
        })
    }

    /// Delete all stored history for `key`.
    ///
    /// Deleting an absent key is not an error and yields [`Forgotten::NotFound`].
    pub async fn forget(&self, key: &str) -> Result<Forgotten, LimiterError> {
        let Some(store) = &self.store else {
            warn!(key = %key, "No attempt store configured");
            return Ok(Forgotten::Unavailable);
        };

        let removed = store.delete(key).await?;
        debug!(key = %key, found = removed.is_some(), "Forgot key");
        Ok(removed.map_or(Forgotten::NotFound, Forgotten::Removed))
    }

    async fn limit_by_key(
        &self,
        key: &str,
        limits: &WindowLimits,
        mode: Mode,
    ) -> Result<Admission, LimiterError> {
        limits.validate()?;
        let Some(store) = &self.store else {
            warn!(key = %key, policy = ?self.options.unavailable_policy, "No attempt store configured");
            return Ok(Admission::Unavailable);
        };

        let mut conflicts = 0;
        loop {
            let now = self.clock.now();

            let (log, expected_version) = match store.get(key).await? {
                None => {
                    if mode == Mode::Check && !self.options.check_creates_record {
                        trace!(key = %key, "No history for key");
                        return Ok(Admission::Admitted);
                    }
                    (AttemptLog::starting_at(now), None)
                }
                Some(record) => {
                    let status = window::evaluate(&record.log, limits, now);
                    if status.is_blocked() {
                        warn!(
                            key = %key,
                            inner_blocked = status.inner_blocked,
                            outer_blocked = status.outer_blocked,
                            "Key is rate limited"
                        );
                        return Ok(Admission::Blocked(status));
                    }
                    if mode == Mode::Check {
                        return Ok(Admission::Admitted);
                    }

                    let mut log = record.log;
                    log_update::record_attempt(&mut log, limits, now);
                    if self.options.prune_expired {
                        let pruned = log_update::prune_expired(&mut log, limits, now);
                        if pruned > 0 {
                            trace!(key = %key, pruned, "Pruned expired entries");
                        }
                    }
                    (log, Some(record.version))
                }
            };

            match store.compare_and_set(key, &log, expected_version).await? {
                Some(version) => {
                    debug!(key = %key, version, entries = log.len(), "Recorded attempt");
                    return Ok(Admission::Admitted);
                }
                None => {
                    conflicts += 1;
                    if conflicts > self.options.max_write_conflicts {
                        return Err(LimiterError::Contention {
                            key: key.to_string(),
                            attempts: conflicts,
                        });
                    }
                    debug!(key = %key, conflicts, "Conflicting write, re-reading log");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogEntry;
    use crate::ports::StoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

    struct TestClock(AtomicI64);

    impl TestClock {
        fn at(now: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(now)))
        }

        fn set(&self, now: i64) {
            self.0.store(now, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct TestStore {
        records: Mutex<HashMap<String, AttemptRecord>>,
        fail: Mutex<bool>,
        forced_conflicts: AtomicU32,
        writes: AtomicU32,
        /// Log another writer stores right after the next `get` hands out its snapshot.
        competing_write: Mutex<Option<AttemptLog>>,
    }

    impl TestStore {
        fn log(&self, key: &str) -> Option<AttemptLog> {
            self.records.lock().unwrap().get(key).map(|r| r.log.clone())
        }

        fn check_failure(&self) -> Result<(), StoreError> {
            if *self.fail.lock().unwrap() {
                return Err(StoreError::Connection("store offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AttemptStore for TestStore {
        async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
            self.check_failure()?;
            let snapshot = self.records.lock().unwrap().get(key).cloned();
            let competing = self.competing_write.lock().unwrap().take();
            if let Some(log) = competing {
                self.set(key, &log).await?;
            }
            Ok(snapshot)
        }

        async fn set(&self, key: &str, log: &AttemptLog) -> Result<u64, StoreError> {
            self.check_failure()?;
            let mut records = self.records.lock().unwrap();
            let version = records.get(key).map_or(1, |r| r.version + 1);
            records.insert(
                key.to_string(),
                AttemptRecord {
                    key: key.to_string(),
                    log: log.clone(),
                    version,
                },
            );
            Ok(version)
        }

        async fn compare_and_set(
            &self,
            key: &str,
            log: &AttemptLog,
            expected_version: Option<u64>,
        ) -> Result<Option<u64>, StoreError> {
            self.check_failure()?;
            if self
                .forced_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(None);
            }
            let current = self.records.lock().unwrap().get(key).map(|r| r.version);
            if current != expected_version {
                return Ok(None);
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.set(key, log).await.map(Some)
        }

        async fn delete(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
            self.check_failure()?;
            Ok(self.records.lock().unwrap().remove(key))
        }
    }

    fn limits() -> WindowLimits {
        WindowLimits {
            outer_window_duration_seconds: 10,
            max_outer_window_request_count: 3,
            inner_window_log_duration_seconds: 5,
            inner_window_block_duration_seconds: 5,
            max_inner_window_request_count: 2,
        }
    }

    fn setup(now: i64) -> (Limiter, Arc<TestStore>, Arc<TestClock>) {
        let store = Arc::new(TestStore::default());
        let clock = TestClock::at(now);
        let limiter = Limiter::new(store.clone(), clock.clone());
        (limiter, store, clock)
    }

    #[tokio::test]
    async fn test_first_contact_is_admitted_and_recorded() {
        let (limiter, store, _clock) = setup(100);

        assert!(limiter.record_and_check("ip:1.2.3.4", &limits()).await.unwrap());
        assert_eq!(
            store.log("ip:1.2.3.4").unwrap().entries(),
            &[LogEntry { timestamp: 100, count: 1 }]
        );
    }

    #[tokio::test]
    async fn test_burst_then_aggregate_scenario() {
        let (limiter, store, clock) = setup(0);
        let key = "user@example.com";
        let limits = limits();

        assert!(limiter.record_and_check(key, &limits).await.unwrap());

        clock.set(1);
        assert!(limiter.record_and_check(key, &limits).await.unwrap());
        assert_eq!(store.log(key).unwrap().entries(), &[LogEntry { timestamp: 0, count: 2 }]);

        clock.set(2);
        assert_eq!(
            limiter.record_attempt(key, &limits).await.unwrap(),
            Admission::Blocked(WindowStatus {
                inner_blocked: true,
                outer_blocked: false,
            })
        );
        assert_eq!(store.log(key).unwrap().entries(), &[LogEntry { timestamp: 0, count: 2 }]);

        clock.set(4);
        assert!(!limiter.check_only(key, &limits).await.unwrap());

        clock.set(6);
        assert!(limiter.check_only(key, &limits).await.unwrap());
        assert!(limiter.record_and_check(key, &limits).await.unwrap());
        assert_eq!(
            store.log(key).unwrap().entries(),
            &[
                LogEntry { timestamp: 0, count: 2 },
                LogEntry { timestamp: 6, count: 1 },
            ]
        );

        clock.set(7);
        assert_eq!(
            limiter.check_attempt(key, &limits).await.unwrap(),
            Admission::Blocked(WindowStatus {
                inner_blocked: false,
                outer_blocked: true,
            })
        );

        clock.set(9);
        assert!(!limiter.record_and_check(key, &limits).await.unwrap());

        clock.set(10);
        assert!(limiter.record_and_check(key, &limits).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_only_never_mutates_existing_log() {
        let (limiter, store, clock) = setup(0);
        limiter.record_and_check("k", &limits()).await.unwrap();
        let before = store.log("k").unwrap();

        for now in 1..4 {
            clock.set(now);
            assert!(limiter.check_only("k", &limits()).await.unwrap());
        }

        assert_eq!(store.log("k").unwrap(), before);
    }

    #[tokio::test]
    async fn test_check_only_on_unseen_key_creates_nothing_by_default() {
        let (limiter, store, _clock) = setup(0);

        assert!(limiter.check_only("fresh", &limits()).await.unwrap());
        assert!(store.log("fresh").is_none());
    }

    #[tokio::test]
    async fn test_check_only_can_seed_unseen_key() {
        let (limiter, store, _clock) = setup(5);
        let limiter = limiter.with_options(LimiterOptions {
            check_creates_record: true,
            ..LimiterOptions::default()
        });

        assert!(limiter.check_only("fresh", &limits()).await.unwrap());
        assert_eq!(store.log("fresh").unwrap().entries(), &[LogEntry::opened_at(5)]);
    }

    #[tokio::test]
    async fn test_forget_returns_prior_record_then_none() {
        let (limiter, store, _clock) = setup(0);
        limiter.record_and_check("k", &limits()).await.unwrap();

        let Forgotten::Removed(removed) = limiter.forget("k").await.unwrap() else {
            panic!("expected the stored record back");
        };
        assert_eq!(removed.key, "k");
        assert_eq!(removed.log, AttemptLog::starting_at(0));
        assert!(store.log("k").is_none());

        assert_eq!(limiter.forget("k").await.unwrap(), Forgotten::NotFound);
    }

    #[tokio::test]
    async fn test_missing_store_follows_policy() {
        let clock = TestClock::at(0);

        let open = Limiter::without_store(clock.clone());
        assert!(open.record_and_check("k", &limits()).await.unwrap());
        assert!(open.check_only("k", &limits()).await.unwrap());
        assert_eq!(open.record_attempt("k", &limits()).await.unwrap(), Admission::Unavailable);

        let closed = Limiter::without_store(clock).with_options(LimiterOptions {
            unavailable_policy: UnavailablePolicy::FailClosed,
            ..LimiterOptions::default()
        });
        assert!(!closed.record_and_check("k", &limits()).await.unwrap());
        assert_eq!(closed.forget("k").await.unwrap(), Forgotten::Unavailable);
        assert_eq!(closed.status("k", &limits()).await.unwrap(), KeyStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let (limiter, store, _clock) = setup(0);
        *store.fail.lock().unwrap() = true;

        let err = limiter.record_and_check("k", &limits()).await.unwrap_err();
        assert!(matches!(err, LimiterError::Storage(StoreError::Connection(_))));
        assert!(limiter.forget("k").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_limits_rejected_before_storage() {
        let (limiter, store, _clock) = setup(0);
        let bad = WindowLimits {
            outer_window_duration_seconds: -1,
            ..limits()
        };

        let err = limiter.record_and_check("k", &bad).await.unwrap_err();
        assert!(matches!(err, LimiterError::InvalidLimits(_)));
        assert!(store.log("k").is_none());
    }

    #[tokio::test]
    async fn test_conflicting_write_is_retried() {
        let (limiter, store, clock) = setup(0);
        limiter.record_and_check("k", &limits()).await.unwrap();

        store.forced_conflicts.store(2, Ordering::SeqCst);
        clock.set(1);
        assert!(limiter.record_and_check("k", &limits()).await.unwrap());
        assert_eq!(store.log("k").unwrap().entries(), &[LogEntry { timestamp: 0, count: 2 }]);
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reread_after_conflict_keeps_other_writers_attempt() {
        let (limiter, store, clock) = setup(0);
        let limits = WindowLimits {
            max_inner_window_request_count: 5,
            max_outer_window_request_count: 10,
            ..limits()
        };
        limiter.record_and_check("k", &limits).await.unwrap();

        // Another caller records its attempt between our read and our write
        *store.competing_write.lock().unwrap() =
            Some(AttemptLog::from_entries(vec![LogEntry { timestamp: 0, count: 2 }]));
        clock.set(1);
        assert!(limiter.record_and_check("k", &limits).await.unwrap());

        let record = store.records.lock().unwrap().get("k").cloned().unwrap();
        assert_eq!(record.log.entries(), &[LogEntry { timestamp: 0, count: 3 }]);
        assert_eq!(record.version, 3);
    }

    #[tokio::test]
    async fn test_reread_after_conflict_sees_burst_cap_reached() {
        let (limiter, store, clock) = setup(0);
        limiter.record_and_check("k", &limits()).await.unwrap();

        // The competing attempt fills the tail up to the burst cap of 2
        *store.competing_write.lock().unwrap() =
            Some(AttemptLog::from_entries(vec![LogEntry { timestamp: 0, count: 2 }]));
        clock.set(1);
        assert_eq!(
            limiter.record_attempt("k", &limits()).await.unwrap(),
            Admission::Blocked(WindowStatus {
                inner_blocked: true,
                outer_blocked: false,
            })
        );
        assert_eq!(store.log("k").unwrap().entries(), &[LogEntry { timestamp: 0, count: 2 }]);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistent_conflicts_surface_contention() {
        let (limiter, store, _clock) = setup(0);
        let limiter = limiter.with_options(LimiterOptions {
            max_write_conflicts: 1,
            ..LimiterOptions::default()
        });
        store.forced_conflicts.store(5, Ordering::SeqCst);

        let err = limiter.record_and_check("k", &limits()).await.unwrap_err();
        assert!(matches!(err, LimiterError::Contention { attempts: 2, .. }));
        assert!(store.log("k").is_none());
    }

    #[tokio::test]
    async fn test_writes_prune_entries_outside_outer_window() {
        let (limiter, store, clock) = setup(0);
        limiter.record_and_check("k", &limits()).await.unwrap();

        clock.set(20);
        limiter.record_and_check("k", &limits()).await.unwrap();
        assert_eq!(store.log("k").unwrap().entries(), &[LogEntry::opened_at(20)]);
    }

    #[tokio::test]
    async fn test_pruning_can_be_disabled() {
        let (limiter, store, clock) = setup(0);
        let limiter = limiter.with_options(LimiterOptions {
            prune_expired: false,
            ..LimiterOptions::default()
        });
        limiter.record_and_check("k", &limits()).await.unwrap();

        clock.set(20);
        limiter.record_and_check("k", &limits()).await.unwrap();
        assert_eq!(store.log("k").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_flags_without_writing() {
        let (limiter, store, clock) = setup(0);
        assert_eq!(limiter.status("k", &limits()).await.unwrap(), KeyStatus::Unseen);

        limiter.record_and_check("k", &limits()).await.unwrap();
        clock.set(1);
        limiter.record_and_check("k", &limits()).await.unwrap();

        assert_eq!(
            limiter.status("k", &limits()).await.unwrap(),
            KeyStatus::Tracked(WindowStatus {
                inner_blocked: true,
                outer_blocked: false,
            })
        );
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }
}
