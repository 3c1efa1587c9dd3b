// src/storage/local.rs

//! Local JSON Lines record file.
//!
//! The file is opened once per crawl. Every post is written as a complete
//! line and flushed, so an interrupted crawl leaves a readable file holding
//! every post up to the last finished line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Post;
use crate::storage::PostSink;
use crate::utils::failures::{FailureKind, FailureLog, filter_map_logged};

/// Append-only JSON Lines writer.
pub struct JsonlStore {
    path: PathBuf,
    file: File,
    written: usize,
}

impl JsonlStore {
    /// Open `path` for a new crawl.
    ///
    /// With `append` existing records are kept, otherwise the file is
    /// truncated first. Parent directories are created as needed.
    pub async fn open(path: impl Into<PathBuf>, append: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&path).await?;

        log::debug!(
            "Opened record file {} ({})",
            path.display(),
            if append { "append" } else { "truncate" }
        );
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Posts written through this handle.
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl PostSink for JsonlStore {
    async fn write_post(&mut self, post: &Post) -> Result<()> {
        let mut line = post.to_record()?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        self.written += 1;
        Ok(())
    }
}

/// Parse record lines, skipping blank lines.
///
/// Invalid lines are recorded as record parse failures and skipped.
pub fn parse_records(content: &str, failures: &mut FailureLog) -> Vec<Post> {
    let lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    filter_map_logged(lines, FailureKind::RecordParse, failures, |(number, line)| {
        Post::from_record(line).map_err(|e| AppError::record_parse(number, e))
    })
    .collect()
}

/// Read every valid record of the file at `path`.
pub async fn read_records(path: impl AsRef<Path>, failures: &mut FailureLog) -> Result<Vec<Post>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::config(format!("Record file {} not found", path.display()))
        } else {
            AppError::Io(e)
        }
    })?;
    Ok(parse_records(&content, failures))
}
