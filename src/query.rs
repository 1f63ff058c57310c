//! Read, search and group queries over the history buffer.
//!
//! Every query works on a copied snapshot, so patterns are compiled and
//! matched without holding the buffer lock.

use crate::buffer::SourceFilter;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::groups::{DEFAULT_GROUP_COLOR, Group};
use crate::manager::TailManager;
use chrono::Utc;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::{debug, info};

const PATTERN_CACHE_LIMIT: usize = 256;

/// Compiled regexes keyed by pattern text and case mode.
///
/// Cleared wholesale once it reaches its limit.
#[derive(Debug, Default)]
pub(crate) struct PatternCache {
    compiled: RwLock<HashMap<(String, bool), Regex>>,
}

impl PatternCache {
    pub(crate) fn compile(&self, pattern: &str, case_insensitive: bool) -> Result<Regex> {
        let key = (pattern.to_string(), case_insensitive);
        if let Some(regex) = self.compiled.read().get(&key) {
            return Ok(regex.clone());
        }

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| Error::InvalidPattern {
                detail: e.to_string(),
            })?;

        let mut compiled = self.compiled.write();
        if compiled.len() >= PATTERN_CACHE_LIMIT {
            debug!(entries = compiled.len(), "pattern cache full; clearing");
            compiled.clear();
        }
        compiled.insert(key, regex.clone());
        Ok(regex)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.compiled.read().len()
    }
}

impl TailManager {
    /// The newest `limit` entries, oldest first. `None` or `""` reads every source.
    pub fn read(&self, source: Option<&str>, limit: usize) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        Ok(self.inner.buffer.read(SourceFilter::from_option(source), limit))
    }

    /// Every retained entry whose content matches `pattern`, in buffer order.
    pub fn search(
        &self,
        pattern: &str,
        source: Option<&str>,
        case_insensitive: bool,
    ) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let regex = self.inner.patterns.compile(pattern, case_insensitive)?;
        Ok(self.inner.buffer.search(&regex, SourceFilter::from_option(source)))
    }

    /// Define a group, replacing any existing group of the same name.
    ///
    /// The pattern is checked here so a bad group never gets installed.
    /// An empty `sources` list covers every source.
    pub fn create_or_replace_group(
        &self,
        name: &str,
        pattern: &str,
        color: Option<&str>,
        sources: Vec<String>,
    ) -> Result<()> {
        self.ensure_open()?;
        if !pattern.is_empty() {
            self.inner.patterns.compile(pattern, true)?;
        }

        let group = Group {
            name: name.to_string(),
            pattern: pattern.to_string(),
            color: color
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_GROUP_COLOR)
                .to_string(),
            sources,
            created_at: Utc::now(),
        };

        let replaced = self.inner.groups.upsert(group).is_some();
        info!(group = name, replaced, "group defined");
        Ok(())
    }

    /// All groups, sorted by name.
    pub fn groups(&self) -> Result<Vec<Group>> {
        self.ensure_open()?;
        Ok(self.inner.groups.list())
    }

    /// The group's pattern applied to the newest `limit` entries of its sources.
    ///
    /// `limit` bounds the window read from the buffer, so fewer than `limit`
    /// entries come back when some in that window don't match.
    pub fn read_group(&self, group: &str, limit: usize) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let group = self.group(group)?;
        let matcher = self.group_matcher(&group)?;

        let window = self.inner.buffer.read(scope(&group), limit);
        Ok(group.apply(window, matcher.as_ref()))
    }

    /// Entries the group admits that also match `pattern`.
    pub fn search_group(
        &self,
        group: &str,
        pattern: &str,
        case_insensitive: bool,
    ) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let group = self.group(group)?;
        let regex = self.inner.patterns.compile(pattern, case_insensitive)?;
        let matcher = self.group_matcher(&group)?;

        let hits = self.inner.buffer.search(&regex, scope(&group));
        Ok(group.apply(hits, matcher.as_ref()))
    }

    fn group(&self, name: &str) -> Result<Group> {
        self.inner.groups.get(name).ok_or_else(|| Error::UnknownGroup {
            name: name.to_string(),
        })
    }

    fn group_matcher(&self, group: &Group) -> Result<Option<Regex>> {
        if group.pattern.is_empty() {
            return Ok(None);
        }
        self.inner.patterns.compile(&group.pattern, true).map(Some)
    }
}

fn scope(group: &Group) -> SourceFilter<'_> {
    if group.sources.is_empty() {
        SourceFilter::All
    } else {
        SourceFilter::AnyOf(&group.sources)
    }
}
