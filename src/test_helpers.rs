//! Test utilities for creating temporary log directories and waiting on async state.

#[cfg(test)]
use std::fs::{File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
pub struct TempLogDir {
    _temp_dir: tempfile::TempDir,
    path: PathBuf,
}

#[cfg(test)]
impl TempLogDir {
    /// Create a new, empty temporary log directory
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().to_path_buf();

        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    /// Create (or replace) a file with raw content and return its path
    pub fn create(&self, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.path.join(name);
        let mut file = File::create(&path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(path)
    }

    /// Append one newline-terminated line to a file
    pub fn append_line(&self, name: &str, line: &str) -> std::io::Result<()> {
        self.append_raw(name, &format!("{line}\n"))
    }

    /// Append raw bytes without adding a newline
    pub fn append_raw(&self, name: &str, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.join(name))?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Truncate a file to zero length
    pub fn truncate(&self, name: &str) -> std::io::Result<()> {
        File::create(self.path.join(name))?;
        Ok(())
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
#[cfg(test)]
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_dir_creation() {
        let dir = TempLogDir::new().unwrap();
        assert!(dir.path().is_dir());
    }

    #[tokio::test]
    async fn test_create_and_append() {
        let dir = TempLogDir::new().unwrap();
        let path = dir.create("app.log", "first\n").unwrap();
        dir.append_line("app.log", "second").unwrap();
        dir.append_raw("app.log", "partial").unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "first\nsecond\npartial");
    }

    #[tokio::test]
    async fn test_truncate() {
        let dir = TempLogDir::new().unwrap();
        let path = dir.create("app.log", "initial content\n").unwrap();
        dir.truncate("app.log").unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let satisfied = wait_until(Duration::from_millis(30), || false).await;
        assert!(!satisfied);
    }
}
