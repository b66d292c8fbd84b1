// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request staging directory
//!
//! Uploaded and fetched images are written to uniquely named files inside a
//! `TempDir` owned by the request. Dropping the [`StagingArea`] removes the
//! directory and everything in it, whichever way the request ends.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const MAX_NAME_HINT_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error("Failed to read image stream: {0}")]
    Stream(String),
}

/// Scoped temp directory for one request
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under `root`, or the system temp dir
    pub fn new(root: Option<&Path>) -> Result<Self, StagingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("crowd-count-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Created staging dir {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a byte stream to a new file, enforcing `max_bytes`
    ///
    /// A partially written file is left for the directory drop to remove.
    pub async fn stage_stream<S, E>(
        &self,
        name_hint: &str,
        stream: S,
        max_bytes: usize,
    ) -> Result<PathBuf, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let path = self.unique_path(name_hint);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let mut stream = std::pin::pin!(stream);
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StagingError::Stream(e.to_string()))?;
            written = written.saturating_add(chunk.len());
            if written > max_bytes {
                return Err(StagingError::TooLarge(max_bytes));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!("Staged {} bytes at {}", written, path.display());
        Ok(path)
    }

    fn unique_path(&self, name_hint: &str) -> PathBuf {
        let cleaned: String = name_hint
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .collect();
        let tail_start = cleaned.len().saturating_sub(MAX_NAME_HINT_LEN);
        let tail = cleaned[tail_start..].trim_start_matches('.');

        let name = if tail.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}-{}", Uuid::new_v4(), tail)
        };
        self.dir.path().join(name)
    }
}
