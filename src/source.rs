//! Source definitions and the registry that resolves them to files.
//!
//! A [`SourceConfig`] names a logical stream and says which files back it:
//! every regular file in `path` whose base name matches one of `patterns`.
//! [`resolve`] performs that match; [`discover_new`] synthesizes one source per
//! loose `*.log`/`*.txt` file in a discovery root.

use crate::error::{Error, Result};
use glob::Pattern;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Colors handed out round-robin to discovered sources.
pub const SOURCE_COLORS: [&str; 6] = ["cyan", "green", "yellow", "magenta", "blue", "red"];

/// File extensions picked up by [`discover_new`].
const DISCOVERY_EXTENSIONS: [&str; 2] = ["log", "txt"];

/// A named binding of a directory, glob patterns, tags and a display color.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color: String,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            tags: Vec::new(),
            color: String::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Whether the base name of `path` matches any of this source's patterns.
    ///
    /// Malformed patterns never match.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.compiled_patterns().iter().any(|p| p.matches(&name))
    }

    fn compiled_patterns(&self) -> Vec<Pattern> {
        self.patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(
                        source = %self.name,
                        pattern = %raw,
                        error = %e,
                        "ignoring malformed glob pattern"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Resolve a source to the set of files it currently matches.
///
/// A directory that does not exist yet resolves to an empty set so the
/// caller can rescan later; any other scan failure is a `Discovery` error.
pub fn resolve(source: &SourceConfig) -> Result<BTreeSet<PathBuf>> {
    let patterns = source.compiled_patterns();
    if patterns.is_empty() {
        return Ok(BTreeSet::new());
    }

    let entries = match std::fs::read_dir(&source.path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(discovery_error(&source.path, e)),
    };

    let mut matched = BTreeSet::new();
    for dir_entry in entries {
        let dir_entry = dir_entry.map_err(|e| discovery_error(&source.path, e))?;
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        let name = dir_entry.file_name();
        let name = name.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&name)) {
            matched.insert(path);
        }
    }

    Ok(matched)
}

/// Synthesize one source per `*.log`/`*.txt` file in `root`.
///
/// Names are file stems. A stem in `excluded`, already used by `configured`,
/// or already produced earlier in the same scan is skipped. Colors continue
/// round-robin from the number of configured sources.
pub fn discover_new(
    root: &Path,
    configured: &[SourceConfig],
    excluded: &HashSet<String>,
) -> Result<Vec<SourceConfig>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(discovery_error(root, e)),
    };

    let mut files = Vec::new();
    for dir_entry in entries {
        let path = dir_entry.map_err(|e| discovery_error(root, e))?.path();
        let has_log_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DISCOVERY_EXTENSIONS.contains(&ext));
        if has_log_extension && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut taken: HashSet<String> = configured.iter().map(|s| s.name.clone()).collect();
    let mut color_idx = configured.len();
    let mut discovered = Vec::new();

    for file in files {
        let (Some(stem), Some(base)) = (file.file_stem(), file.file_name()) else {
            continue;
        };
        let name = stem.to_string_lossy().to_string();
        if excluded.contains(&name) || taken.contains(&name) {
            continue;
        }

        let pattern = Pattern::escape(&base.to_string_lossy());
        discovered.push(SourceConfig {
            name: name.clone(),
            path: root.to_path_buf(),
            patterns: vec![pattern],
            tags: Vec::new(),
            color: SOURCE_COLORS[color_idx % SOURCE_COLORS.len()].to_string(),
        });
        taken.insert(name);
        color_idx += 1;
    }

    Ok(discovered)
}

fn discovery_error(path: &Path, e: std::io::Error) -> Error {
    Error::Discovery {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
