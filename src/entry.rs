//! The immutable record produced for every ingested line.

use chrono::{DateTime, Local, Utc};
use std::fmt;

/// One ingested log line with its metadata.
///
/// Entries are produced once by the follower that read the line and then
/// cloned into every consumer; nothing mutates an entry after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Wall-clock time the line was read, not the file's mtime.
    pub timestamp: DateTime<Utc>,
    /// Logical stream name from configuration (not the file path).
    pub source: String,
    /// The line without its trailing newline.
    pub content: String,
    /// Source-level tags, in configuration order.
    pub tags: Vec<String>,
    /// 1-based, strictly increasing per source.
    pub sequence: u64,
}

impl Entry {
    pub fn new(
        source: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
        sequence: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            content: content.into(),
            tags,
            sequence,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            self.source,
            self.content
        )
    }
}
