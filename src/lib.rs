//! A tailing and buffering engine for append-only log files.
//!
//! Files are grouped into named sources. Each matched file gets a follower
//! task that reads complete new lines and turns them into [`Entry`] values
//! carrying a per-source sequence number. Entries are routed into a bounded
//! history buffer that answers point-in-time reads and regex searches, and
//! are fanned out live to any number of subscribers.
//!
//! ```text
//!  file ─▶ Follower ─┐
//!  file ─▶ Follower ─┼─▶ Outbox (per source) ─▶ router ─▶ broadcast ─┬─▶ HistoryBuffer
//!  file ─▶ Follower ─┘                                                └─▶ EntryStream(s)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use logtail::{SourceConfig, TailManager, TailOptions};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TailManager::new(TailOptions::default());
//!     manager.tail(SourceConfig::new("api", "/var/log/api", &["*.log"])).await?;
//!
//!     for entry in manager.search("(?i)error", Some("api"), false)? {
//!         println!("{entry}");
//!     }
//!
//!     let mut live = manager.subscribe()?;
//!     while let Some(entry) = live.next().await {
//!         println!("{entry}");
//!     }
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

mod buffer;
mod config;
mod entry;
mod error;
mod follower;
mod groups;
mod manager;
mod query;
mod reader;
mod router;
mod source;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use buffer::{DEFAULT_CAPACITY, HistoryBuffer, SourceFilter};
pub use crate::config::{Config, EngineConfig, default_log_dir, expand_path, find_config_file};
pub use entry::Entry;
pub use error::{Error, Result};
pub use groups::{DEFAULT_GROUP_COLOR, Group, GroupConfig, GroupRegistry};
pub use manager::{SourceInfo, Stats, TailManager, TailOptions};
pub use source::{SOURCE_COLORS, SourceConfig, discover_new, resolve};
pub use stream::EntryStream;
