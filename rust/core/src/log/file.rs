// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Private append-only log file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::once::OnceInit;

/// Log file under a private storage root, written from a tracked byte offset.
///
/// The handle is acquired lazily on the first append and at most once; the
/// offset starts at the file's length at that moment. Another process writing
/// the same file is not detected.
#[derive(Debug)]
pub struct PrivateLogFile {
    root: Option<PathBuf>,
    dir_name: String,
    file_name: String,
    handle: OnceInit<Option<Mutex<Cursor>>>,
}

#[derive(Debug)]
struct Cursor {
    path: PathBuf,
    offset: u64,
}

impl PrivateLogFile {
    pub fn new(root: impl Into<PathBuf>, dir_name: &str, file_name: &str) -> Self {
        Self {
            root: Some(root.into()),
            dir_name: dir_name.to_string(),
            file_name: file_name.to_string(),
            handle: OnceInit::new(),
        }
    }

    /// A log file that never writes.
    pub fn unavailable() -> Self {
        Self {
            root: None,
            dir_name: String::new(),
            file_name: String::new(),
            handle: OnceInit::new(),
        }
    }

    /// Full path of the log file, if a storage root is configured.
    pub fn path(&self) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(&self.dir_name).join(&self.file_name))
    }

    async fn cursor(&self) -> Option<&Mutex<Cursor>> {
        self.handle
            .get_or_init(move || async move {
                let root = self.root.as_deref()?;
                match self.acquire(root).await {
                    Ok(cursor) => Some(Mutex::new(cursor)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not initialise private log storage");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn acquire(&self, root: &Path) -> Result<Cursor, StorageError> {
        let dir = root.join(&self.dir_name);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&self.file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let offset = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        tracing::debug!(path = %path.display(), offset, "Private log file ready");
        Ok(Cursor { path, offset })
    }

    /// Write `line` plus a newline at the tracked offset. Failures only warn.
    pub async fn append_line(&self, line: &str) {
        let Some(cursor) = self.cursor().await else {
            return;
        };
        let mut cursor = cursor.lock().await;
        let data = format!("{line}\n");
        match write_at(&cursor.path, cursor.offset, data.as_bytes()).await {
            Ok(()) => cursor.offset += data.len() as u64,
            Err(e) => tracing::warn!(error = %e, "Could not write the automatic log file"),
        }
    }

    /// Current write offset, or `None` when the file is unavailable.
    pub async fn offset(&self) -> Option<u64> {
        let cursor = self.cursor().await?;
        let offset = cursor.lock().await.offset;
        Some(offset)
    }
}

async fn write_at(path: &Path, offset: u64, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}
