//! Named query-time filters over the history buffer.

use crate::entry::Entry;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Color used when a group is created without one.
pub const DEFAULT_GROUP_COLOR: &str = "cyan";

/// A group as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub streams: Vec<String>,
}

/// A saved regex + source-list filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    /// Matched case-insensitively; empty means no content filter.
    pub pattern: String,
    pub color: String,
    /// Empty means every source.
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn covers(&self, source: &str) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|s| s == source)
    }

    /// Keep the entries this group admits. `matcher` is the compiled group
    /// pattern, or `None` when the pattern is empty.
    pub(crate) fn apply(&self, entries: Vec<Entry>, matcher: Option<&regex::Regex>) -> Vec<Entry> {
        entries
            .into_iter()
            .filter(|e| self.covers(&e.source))
            .filter(|e| matcher.is_none_or(|re| re.is_match(&e.content)))
            .collect()
    }
}

/// Process-lifetime group definitions, upserted by name.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<BTreeMap<String, Group>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a group, returning the definition it replaced.
    pub fn upsert(&self, group: Group) -> Option<Group> {
        self.groups.write().insert(group.name.clone(), group)
    }

    pub fn get(&self, name: &str) -> Option<Group> {
        self.groups.read().get(name).cloned()
    }

    /// All groups, sorted by name.
    pub fn list(&self) -> Vec<Group> {
        self.groups.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
