//! # JSONL Log Writer
//!
//! Append-only JSON Lines file. Each record is written with a single write
//! call and flushed before the next one, so a reader tailing the file (or a
//! crash right after) always sees whole lines.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::Result;

/// Append-only JSONL file handle
#[derive(Debug)]
pub struct JsonlWriter {
    file: File,
    path: PathBuf,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open `path` for appending, creating it and its parent directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the file opened
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!("Appending telemetry to {}", path.display());
        Ok(Self { file, path, lines_written: 0 })
    }

    /// Append one line (a newline is added) and flush
    pub async fn append(&mut self, line: &str) -> Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        self.file.write_all(buf.as_bytes()).await?;
        self.file.flush().await?;

        self.lines_written += 1;
        Ok(())
    }

    /// Lines appended through this handle
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync to disk
    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        debug!("Closed {} after {} lines", self.path.display(), self.lines_written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/esp_logger/esp_log.jsonl");

        let writer = JsonlWriter::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(writer.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_each_append_is_immediately_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("esp_log.jsonl");
        let mut writer = JsonlWriter::open(&path).await.unwrap();

        writer.append(r#"{"v":1}"#).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"v\":1}\n");

        writer.append(r#"{"v":2}"#).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"v\":1}\n{\"v\":2}\n");
        assert_eq!(writer.lines_written(), 2);
    }

    #[tokio::test]
    async fn test_reopen_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("esp_log.jsonl");

        let mut first = JsonlWriter::open(&path).await.unwrap();
        first.append("{\"a\":1}").await.unwrap();
        first.close().await.unwrap();

        let mut second = JsonlWriter::open(&path).await.unwrap();
        second.append("{\"b\":2}").await.unwrap();
        second.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}\n{\"b\":2}\n");
    }

    #[tokio::test]
    async fn test_open_fails_when_parent_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let result = JsonlWriter::open(blocker.join("esp_log.jsonl")).await;
        assert!(result.is_err());
    }
}
