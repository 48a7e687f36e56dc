//! Time-ordered message log with lazy eviction.
//!
//! There is no background timer. Entries older than the retention window
//! stay in the log until a reconnect scan visits them, at which point they
//! are removed for everyone.
//!
//! ## Scan contract
//!
//! `scan` takes `&mut self`, so the borrow checker guarantees no append or
//! other scan runs concurrently with it; callers sharing the log across tasks
//! hold the group lock for the whole call. Within a scan every entry is
//! visited exactly once, in append order, and removal happens through
//! `VecDeque::retain` rather than index bookkeeping.

use std::{collections::VecDeque, sync::Arc, time::Duration};

/// How long a message stays eligible for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow(Duration);

impl RetentionWindow {
    /// Window of `secs` whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Window length.
    pub const fn duration(self) -> Duration {
        self.0
    }

    /// Whether an entry of the given age must be evicted.
    ///
    /// Strict comparison: an entry exactly one window old is still replayed.
    pub fn is_expired(self, age: Duration) -> bool {
        age > self.0
    }
}

/// One multicast message as stored for replay.
///
/// Immutable once created; the text is shared with every delivery.
///
/// `created_at` is a monotonic instant at full clock resolution, not a
/// whole-second stamp. Ages are therefore compared sub-second: a message
/// sent at 1.9s with a 5s window is evicted by a scan at 6.95s, where
/// truncated seconds would still count it as 5s old.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry<I> {
    text: Arc<str>,
    created_at: I,
}

impl<I: Copy> LogEntry<I> {
    /// Stamp `text` with its creation instant.
    pub fn new(text: Arc<str>, created_at: I) -> Self {
        Self { text, created_at }
    }

    /// Fully formatted message text.
    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    /// When the entry was appended.
    pub fn created_at(&self) -> I {
        self.created_at
    }
}

/// Result of a reconnect scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Texts still inside the window, in original send order.
    pub replay: Vec<Arc<str>>,
    /// Number of entries removed as expired.
    pub evicted: usize,
}

/// Append-only (modulo eviction) log of multicast messages.
#[derive(Debug, Clone)]
pub struct MessageLog<I> {
    entries: VecDeque<LogEntry<I>>,
}

impl<I> MessageLog<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Create an empty log.
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Append a message stamped at `now`.
    pub fn append(&mut self, text: Arc<str>, now: I) {
        debug_assert!(
            self.entries.back().is_none_or(|last| last.created_at <= now),
            "log timestamps must be monotonic"
        );
        self.entries.push_back(LogEntry::new(text, now));
    }

    /// Visit every entry once: evict expired ones, collect the rest.
    pub fn scan(&mut self, now: I, window: RetentionWindow) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        self.entries.retain(|entry| {
            let age = now - entry.created_at;
            if window.is_expired(age) {
                outcome.evicted += 1;
                false
            } else {
                outcome.replay.push(Arc::clone(&entry.text));
                true
            }
        });

        outcome
    }

    /// Number of stored entries (including expired ones not yet scanned).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in append order.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry<I>> {
        self.entries.iter()
    }
}

impl<I> Default for MessageLog<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::env::ManualInstant;

    fn at(secs: u64) -> ManualInstant {
        ManualInstant(Duration::from_secs(secs))
    }

    fn texts(outcome: &ScanOutcome) -> Vec<&str> {
        outcome.replay.iter().map(AsRef::as_ref).collect()
    }

    #[test]
    fn scan_replays_in_append_order() {
        let mut log = MessageLog::new();
        log.append("a".into(), at(0));
        log.append("b".into(), at(1));
        log.append("c".into(), at(2));

        let outcome = log.scan(at(3), RetentionWindow::from_secs(5));

        assert_eq!(texts(&outcome), ["a", "b", "c"]);
        assert_eq!(outcome.evicted, 0);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn ages_keep_sub_second_resolution() {
        let mut log = MessageLog::new();
        log.append("late".into(), ManualInstant(Duration::from_millis(1_900)));

        let outcome = log.scan(ManualInstant(Duration::from_millis(6_950)), RetentionWindow::from_secs(5));
        assert!(outcome.replay.is_empty());
        assert_eq!(outcome.evicted, 1);
    }

    #[test]
    fn boundary_age_is_retained() {
        let mut log = MessageLog::new();
        log.append("edge".into(), at(10));

        let outcome = log.scan(at(15), RetentionWindow::from_secs(5));
        assert_eq!(texts(&outcome), ["edge"]);

        let later = ManualInstant(Duration::from_secs(15) + Duration::from_millis(1));
        let outcome = log.scan(later, RetentionWindow::from_secs(5));
        assert!(outcome.replay.is_empty());
        assert_eq!(outcome.evicted, 1);
    }

    #[test]
    fn eviction_is_permanent() {
        let mut log = MessageLog::new();
        log.append("old".into(), at(0));
        log.append("new".into(), at(8));

        let first = log.scan(at(10), RetentionWindow::from_secs(5));
        assert_eq!(texts(&first), ["new"]);
        assert_eq!(first.evicted, 1);

        // Even a scan "in the past" cannot resurrect the evicted entry.
        let second = log.scan(at(8), RetentionWindow::from_secs(5));
        assert_eq!(texts(&second), ["new"]);
        assert_eq!(second.evicted, 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn zero_window_keeps_only_same_instant() {
        let mut log = MessageLog::new();
        log.append("x".into(), at(1));
        log.append("y".into(), at(2));

        let outcome = log.scan(at(2), RetentionWindow::from_secs(0));
        assert_eq!(texts(&outcome), ["y"]);
    }

    proptest! {
        #[test]
        fn scan_partitions_every_entry_exactly_once(
            gaps in prop::collection::vec(0u64..4, 0..40),
            now_offset in 0u64..20,
            window in 0u64..10,
        ) {
            let mut log = MessageLog::new();
            let mut t = 0;
            for (i, gap) in gaps.iter().enumerate() {
                t += gap;
                log.append(Arc::from(i.to_string()), at(t));
            }
            let total = log.len();
            let now = at(t + now_offset);

            let outcome = log.scan(now, RetentionWindow::from_secs(window));

            prop_assert_eq!(outcome.replay.len() + outcome.evicted, total);
            prop_assert_eq!(log.len(), outcome.replay.len());
            let order: Vec<usize> =
                outcome.replay.iter().map(|s| s.parse().unwrap()).collect();
            prop_assert!(order.windows(2).all(|w| w[0] < w[1]));
            for entry in log.iter() {
                prop_assert!(now - entry.created_at() <= Duration::from_secs(window));
            }
        }
    }
}
