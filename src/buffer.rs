//! Buffer Keeper: the capped, arrival-ordered history every query reads.
//!
//! The buffer is a FIFO ring: once `capacity` entries are held, each append
//! evicts the oldest one. Appends take the exclusive lock for O(1) work;
//! reads and search snapshots take the shared lock only long enough to copy
//! what they need, so regex scans never run against live state.

use crate::entry::Entry;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::VecDeque;

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Which sources a read or search considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter<'a> {
    /// Every source.
    All,
    /// Exactly this source name.
    Named(&'a str),
    /// Any of these source names.
    AnyOf(&'a [String]),
}

impl<'a> SourceFilter<'a> {
    /// `None` and `""` both mean every source.
    pub fn from_option(source: Option<&'a str>) -> Self {
        match source {
            Some(name) if !name.is_empty() => SourceFilter::Named(name),
            _ => SourceFilter::All,
        }
    }

    pub fn admits(&self, source: &str) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Named(name) => *name == source,
            SourceFilter::AnyOf(names) => names.iter().any(|n| n == source),
        }
    }
}

/// Bounded, most-recent-N history of entries across all sources.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: RwLock<VecDeque<Entry>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest once at capacity.
    pub fn append(&self, entry: Entry) {
        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The newest `limit` entries admitted by `filter`, oldest first.
    pub fn read(&self, filter: SourceFilter<'_>, limit: usize) -> Vec<Entry> {
        if limit == 0 {
            return Vec::new();
        }

        let entries = self.entries.read();
        let mut newest: Vec<Entry> = entries
            .iter()
            .rev()
            .filter(|e| filter.admits(&e.source))
            .take(limit)
            .cloned()
            .collect();
        drop(entries);

        newest.reverse();
        newest
    }

    /// A point-in-time copy of the entries admitted by `filter`, in arrival order.
    pub fn snapshot(&self, filter: SourceFilter<'_>) -> Vec<Entry> {
        self.entries
            .read()
            .iter()
            .filter(|e| filter.admits(&e.source))
            .cloned()
            .collect()
    }

    /// Entries whose content matches `pattern`, scanned over a snapshot.
    pub fn search(&self, pattern: &Regex, filter: SourceFilter<'_>) -> Vec<Entry> {
        let mut snapshot = self.snapshot(filter);
        snapshot.retain(|e| pattern.is_match(&e.content));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn hold_exclusive(&self) -> parking_lot::RwLockWriteGuard<'_, VecDeque<Entry>> {
        self.entries.write()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn entry(source: &str, content: &str, sequence: u64) -> Entry {
        Entry::new(source, content, Vec::new(), sequence)
    }

    fn contents(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.content.as_str()).collect()
    }

    #[test]
    fn test_capacity_three_keeps_newest() {
        let buffer = HistoryBuffer::with_capacity(3);
        for (i, line) in ["a", "b", "c", "d"].iter().enumerate() {
            buffer.append(entry("app", line, i as u64 + 1));
        }

        let result = buffer.read(SourceFilter::Named("app"), 10);
        assert_eq!(contents(&result), vec!["b", "c", "d"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_read_filters_by_source_and_limits_to_newest() {
        let buffer = HistoryBuffer::new();
        buffer.append(entry("app", "a1", 1));
        buffer.append(entry("db", "d1", 1));
        buffer.append(entry("app", "a2", 2));
        buffer.append(entry("db", "d2", 2));
        buffer.append(entry("app", "a3", 3));

        let result = buffer.read(SourceFilter::Named("app"), 2);
        assert_eq!(contents(&result), vec!["a2", "a3"]);

        let all = buffer.read(SourceFilter::All, 10);
        assert_eq!(contents(&all), vec!["a1", "d1", "a2", "d2", "a3"]);
    }

    #[test]
    fn test_read_zero_limit_is_empty() {
        let buffer = HistoryBuffer::new();
        buffer.append(entry("app", "a", 1));
        assert!(buffer.read(SourceFilter::All, 0).is_empty());
    }

    #[test]
    fn test_read_unknown_source_is_empty() {
        let buffer = HistoryBuffer::new();
        buffer.append(entry("app", "a", 1));
        assert!(buffer.read(SourceFilter::Named("nope"), 10).is_empty());
    }

    #[test]
    fn test_source_filter_from_option() {
        assert_eq!(SourceFilter::from_option(None), SourceFilter::All);
        assert_eq!(SourceFilter::from_option(Some("")), SourceFilter::All);
        assert_eq!(SourceFilter::from_option(Some("app")), SourceFilter::Named("app"));
    }

    #[test]
    fn test_any_of_filter() {
        let names = vec!["app".to_string(), "db".to_string()];
        let filter = SourceFilter::AnyOf(&names);
        assert!(filter.admits("app"));
        assert!(filter.admits("db"));
        assert!(!filter.admits("cache"));
    }

    #[test]
    fn test_search_is_case_sensitive_by_default() {
        let buffer = HistoryBuffer::new();
        buffer.append(entry("app", "INFO x", 1));
        buffer.append(entry("app", "ERRab", 2));
        buffer.append(entry("app", "y ERROR", 3));

        let hits = buffer.search(&Regex::new("ERR").unwrap(), SourceFilter::All);
        assert_eq!(contents(&hits), vec!["ERRab", "y ERROR"]);

        let hits = buffer.search(&Regex::new("err").unwrap(), SourceFilter::All);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_respects_source_filter() {
        let buffer = HistoryBuffer::new();
        buffer.append(entry("app", "error in app", 1));
        buffer.append(entry("db", "error in db", 1));

        let hits = buffer.search(&Regex::new("error").unwrap(), SourceFilter::Named("db"));
        assert_eq!(contents(&hits), vec!["error in db"]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let buffer = HistoryBuffer::new();
        for i in 0..50 {
            buffer.append(entry("app", &format!("line {i}"), i + 1));
        }
        let pattern = Regex::new(r"line \d*7$").unwrap();

        let first = buffer.search(&pattern, SourceFilter::All);
        let second = buffer.search(&pattern, SourceFilter::All);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let buffer = HistoryBuffer::with_capacity(3);
        buffer.append(entry("app", "a", 1));
        buffer.append(entry("app", "b", 2));

        let snapshot = buffer.snapshot(SourceFilter::All);
        buffer.append(entry("app", "c", 3));
        buffer.append(entry("app", "d", 4));

        assert_eq!(contents(&snapshot), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let buffer = HistoryBuffer::with_capacity(0);
        buffer.append(entry("app", "a", 1));
        buffer.append(entry("app", "b", 2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(contents(&buffer.read(SourceFilter::All, 5)), vec!["b"]);
    }

    #[tokio::test]
    async fn test_concurrent_reads_and_appends() {
        let buffer = Arc::new(HistoryBuffer::with_capacity(100));
        let mut handles = Vec::new();

        let writer = Arc::clone(&buffer);
        handles.push(tokio::spawn(async move {
            for i in 0..1000u64 {
                writer.append(entry("app", &format!("line {i}"), i + 1));
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));

        for _ in 0..4 {
            let reader = Arc::clone(&buffer);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let snapshot = reader.read(SourceFilter::Named("app"), 100);
                    assert!(snapshot.len() <= 100);
                    assert!(snapshot.windows(2).all(|w| w[0].sequence < w[1].sequence));
                    tokio::task::yield_now().await;
                }
            }));
        }

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.read(SourceFilter::All, 1)[0].sequence, 1000);
    }

    proptest! {
        #[test]
        fn prop_ring_keeps_last_capacity_in_order(capacity in 1usize..32, n in 0usize..128) {
            let buffer = HistoryBuffer::with_capacity(capacity);
            for i in 0..n {
                buffer.append(entry("app", &i.to_string(), i as u64 + 1));
                prop_assert!(buffer.len() <= capacity);
            }

            prop_assert_eq!(buffer.len(), n.min(capacity));
            let kept: Vec<u64> = buffer
                .snapshot(SourceFilter::All)
                .iter()
                .map(|e| e.sequence)
                .collect();
            let expected: Vec<u64> = ((n.saturating_sub(capacity) as u64 + 1)..=n as u64).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn prop_read_only_returns_requested_source(
            sources in proptest::collection::vec(0u8..3, 0..64),
            limit in 0usize..20,
        ) {
            let buffer = HistoryBuffer::new();
            for (i, s) in sources.iter().enumerate() {
                buffer.append(entry(&format!("s{s}"), "x", i as u64 + 1));
            }

            let result = buffer.read(SourceFilter::Named("s1"), limit);
            prop_assert!(result.len() <= limit);
            prop_assert!(result.iter().all(|e| e.source == "s1"));
            prop_assert!(result.windows(2).all(|w| w[0].sequence < w[1].sequence));
        }
    }
}
