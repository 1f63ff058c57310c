//! On-disk configuration and the auto-discovery driver.
//!
//! [`Config::load`] reads a YAML file (explicit path or the first hit of
//! [`find_config_file`]). Every section is optional; a missing `engine`
//! section yields the engine defaults.

use crate::error::{Error, Result};
use crate::groups::GroupConfig;
use crate::manager::TailOptions;
use crate::source::{self, SourceConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Local candidates, checked in the working directory in this order.
const LOCAL_CONFIG_FILES: [&str; 4] = [
    "logtail.yaml",
    "logtail.yml",
    ".logtail.yaml",
    ".logtail.yml",
];

/// Global candidates under `$HOME/.config`.
const GLOBAL_CONFIG_FILES: [&str; 2] = ["logtail.yaml", "logtail.yml"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Auto-discovery root; defaults to [`default_log_dir`].
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub streams: Vec<SourceConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// `engine:` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_router_capacity")]
    pub router_capacity: usize,
    #[serde(default = "default_overflow_capacity")]
    pub overflow_capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
    #[serde(default = "default_watch_events")]
    pub watch_events: bool,
}

fn default_buffer_capacity() -> usize { 1000 }
fn default_router_capacity() -> usize { 10_000 }
fn default_overflow_capacity() -> usize { 1000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_rescan_interval_secs() -> u64 { 5 }
fn default_watch_events() -> bool { true }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            router_capacity: default_router_capacity(),
            overflow_capacity: default_overflow_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            rescan_interval_secs: default_rescan_interval_secs(),
            watch_events: default_watch_events(),
        }
    }
}

impl EngineConfig {
    pub fn to_options(&self, tail_only: bool) -> TailOptions {
        TailOptions {
            buffer_capacity: self.buffer_capacity,
            router_capacity: self.router_capacity,
            overflow_capacity: self.overflow_capacity,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            rescan_interval: Duration::from_secs(self.rescan_interval_secs),
            tail_only,
            watch_events: self.watch_events,
        }
    }
}

impl Config {
    /// Load from `path`, or from the first file [`find_config_file`] finds.
    ///
    /// Stream paths have a leading `~` expanded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => find_config_file().ok_or_else(|| {
                Error::Config(config::ConfigError::NotFound(
                    "no logtail.yaml in the working directory or ~/.config".to_string(),
                ))
            })?,
        };

        let mut cfg: Config = config::Config::builder()
            .add_source(config::File::from(path.as_path()).format(config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        for stream in &mut cfg.streams {
            stream.path = expand_path(&stream.path.to_string_lossy());
        }

        info!(
            path = %path.display(),
            streams = cfg.streams.len(),
            groups = cfg.groups.len(),
            "configuration loaded"
        );
        Ok(cfg)
    }

    /// The discovery root: `log_dir` with `~` expanded, or the default.
    pub fn discovery_root(&self) -> PathBuf {
        match self.log_dir.as_deref() {
            Some(dir) if !dir.is_empty() => expand_path(dir),
            _ => default_log_dir(),
        }
    }

    /// Append one stream per undeclared `*.log`/`*.txt` file in the discovery root.
    ///
    /// A missing root is not an error.
    pub fn auto_discover(&mut self, excluded: &HashSet<String>) -> Result<()> {
        let root = self.discovery_root();
        let discovered = source::discover_new(&root, &self.streams, excluded)?;
        if !discovered.is_empty() {
            debug!(root = %root.display(), count = discovered.len(), "discovered streams");
        }
        self.streams.extend(discovered);
        Ok(())
    }
}

/// `~/.local/share/logtail/logs`.
pub fn default_log_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("logtail").join("logs")
}

/// First existing config file: local candidates, then `$HOME/.config`.
pub fn find_config_file() -> Option<PathBuf> {
    find_config_file_in(Path::new("."), &home_dir())
}

fn find_config_file_in(cwd: &Path, home: &Path) -> Option<PathBuf> {
    let global_dir = home.join(".config");
    LOCAL_CONFIG_FILES
        .iter()
        .map(|name| cwd.join(name))
        .chain(GLOBAL_CONFIG_FILES.iter().map(|name| global_dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    expand_path_with(path, &home_dir())
}

fn expand_path_with(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => home.join(rest.trim_start_matches('/')),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
