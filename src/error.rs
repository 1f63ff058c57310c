//! Error types for the tailing engine.

use thiserror::Error;

/// The main error type for tailing and query operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors outside of a running follower (opening config, scanning).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// A source's directory could not be scanned.
    #[error("Discovery failed for {path}: {message}")]
    Discovery { path: String, message: String },

    /// Opening, seeking or reading a followed file failed.
    #[error("Failed to follow {path}: {source}")]
    FollowerIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A search or group pattern did not compile.
    #[error("Invalid pattern: {detail}")]
    InvalidPattern { detail: String },

    /// A group query named a group that was never defined.
    #[error("Unknown group: {name}")]
    UnknownGroup { name: String },

    /// Configuration could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The manager has been shut down.
    #[error("Tail manager closed")]
    Closed,
}

impl Error {
    pub(crate) fn follower_io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::FollowerIo {
            path: path.display().to_string(),
            source,
        }
    }
}

/// A convenient Result type for tailing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};
    use std::path::Path;

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();

        match error {
            Error::Io(_) => {}
            _ => panic!("Expected Error::Io variant"),
        }

        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
    }

    #[test]
    fn test_watcher_error_conversion() {
        let notify_error = notify::Error::generic("Test watcher error");
        let error: Error = notify_error.into();

        match error {
            Error::Watcher(_) => {}
            _ => panic!("Expected Error::Watcher variant"),
        }

        assert!(error.to_string().contains("File watcher error"));
        assert!(error.to_string().contains("Test watcher error"));
    }

    #[test]
    fn test_invalid_pattern_error() {
        let error = Error::InvalidPattern {
            detail: "unclosed group".to_string(),
        };

        assert_eq!(error.to_string(), "Invalid pattern: unclosed group");
    }

    #[test]
    fn test_discovery_error() {
        let error = Error::Discovery {
            path: "/var/log/app".to_string(),
            message: "permission denied".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Discovery failed for /var/log/app: permission denied"
        );
    }

    #[test]
    fn test_follower_io_keeps_source_chain() {
        let error = Error::follower_io(
            Path::new("/var/log/app.log"),
            IoError::new(ErrorKind::PermissionDenied, "Access denied"),
        );

        assert_eq!(
            error.to_string(),
            "Failed to follow /var/log/app.log: Access denied"
        );

        let source = std::error::Error::source(&error).expect("io source");
        assert_eq!(source.to_string(), "Access denied");
    }

    #[test]
    fn test_closed_error() {
        let error = Error::Closed;
        assert_eq!(error.to_string(), "Tail manager closed");
        assert_eq!(format!("{:?}", error), "Closed");
    }

    #[test]
    fn test_unknown_group_error() {
        let error = Error::UnknownGroup {
            name: "errors".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown group: errors");
    }

    #[test]
    fn test_error_send_sync_traits() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
