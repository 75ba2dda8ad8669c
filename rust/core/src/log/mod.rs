// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Activity log.
//!
//! Every entry goes to three places:
//!
//! - the session history, unbounded, used for the text export
//! - the display panel, capped (oldest evicted) and filterable
//! - persistence: a capped JSON array in a [`KeyValueStore`] and a line in
//!   the private append-only [`PrivateLogFile`]
//!
//! Persistence runs on a background task, in the order entries were
//! recorded. Failures never reach the caller; they are reported with
//! `tracing::warn!` and otherwise ignored.

mod durable;
mod entry;
mod file;
mod panel;

pub use durable::{DurableLog, JsonFileStore, KeyValueStore, MemoryStore};
pub use entry::{LogEntry, LogKind, StoredEntry};
pub use file::PrivateLogFile;
pub use panel::LogPanel;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::config::LogConfig;
use crate::error::error_detail;

enum FileOp {
    Append { entry: LogEntry, line: String },
    Flush(oneshot::Sender<()>),
}

struct LogInner {
    history: Vec<String>,
    panel: LogPanel,
}

/// Append-only event log with bounded display and dual persistence.
pub struct LogStore {
    inner: Mutex<LogInner>,
    durable: Arc<DurableLog>,
    writer: Option<mpsc::UnboundedSender<FileOp>>,
}

impl LogStore {
    /// Create an empty log.
    ///
    /// Store writes and file appends run on a background task. Outside a
    /// tokio runtime the log file is disabled and the store is written
    /// inline.
    pub fn new(
        config: &LogConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        file: PrivateLogFile,
    ) -> Self {
        let durable = Arc::new(DurableLog::new(
            store,
            config.storage_key.clone(),
            config.persisted_cap,
        ));
        let writer = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (tx, rx) = mpsc::unbounded_channel();
                runtime.spawn(run_writer(durable.clone(), file, rx));
                Some(tx)
            }
            Err(_) => {
                tracing::warn!("No async runtime, automatic log file disabled");
                None
            }
        };

        Self {
            inner: Mutex::new(LogInner {
                history: Vec::new(),
                panel: LogPanel::new(config.display_cap),
            }),
            durable,
            writer,
        }
    }

    /// Create the log and replay the entries persisted by earlier sessions.
    pub fn open(
        config: &LogConfig,
        store: Option<Arc<dyn KeyValueStore>>,
        file: PrivateLogFile,
    ) -> Self {
        let log = Self::new(config, store, file);
        let restored = log.restore();
        if restored > 0 {
            tracing::debug!(restored, "Restored previous log entries");
        }
        log
    }

    /// Replay persisted entries, oldest first, without persisting them again.
    ///
    /// Reads the store on the calling thread.
    pub fn restore(&self) -> usize {
        let entries = self.durable.load();
        let count = entries.len();
        for entry in entries {
            self.record(entry, false);
        }
        count
    }

    pub fn append(&self, message: impl Into<String>, kind: LogKind, detail: Option<String>) {
        self.record(LogEntry::new(message, kind, detail), true);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(message, LogKind::Info, None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.append(message, LogKind::Success, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(message, LogKind::Error, None);
    }

    /// Error entry carrying `err` and its sources as detail.
    pub fn error_with(&self, message: impl Into<String>, err: &(dyn std::error::Error + 'static)) {
        self.append(message, LogKind::Error, Some(error_detail(err)));
    }

    fn record(&self, entry: LogEntry, persist: bool) {
        let line = entry.format_line();
        echo(&entry);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.history.push(line.clone());
        inner.panel.push(entry.clone());
        if !persist {
            return;
        }
        match &self.writer {
            // Queued under the lock so persistence follows history order.
            // The writer only stops when the runtime shuts down.
            Some(writer) => {
                let _ = writer.send(FileOp::Append { entry, line });
            }
            None => {
                drop(inner);
                self.durable.persist(&entry);
            }
        }
    }

    /// Every formatted line of this session, including restored ones.
    pub fn history(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }

    /// Plain-text export of the whole session history.
    pub fn export_text(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .join("\n")
    }

    pub fn set_filter(&self, filter: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .panel
            .set_filter(filter);
    }

    /// Panel entries that pass the current filter, oldest first.
    pub fn visible(&self) -> Vec<LogEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .panel
            .visible()
    }

    /// The newest entry, ignoring the filter.
    pub fn latest(&self) -> Option<LogEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .panel
            .last()
            .cloned()
    }

    /// Entries in the display panel, ignoring the filter.
    pub fn displayed_len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .panel
            .len()
    }

    pub fn durable(&self) -> &DurableLog {
        &self.durable
    }

    /// Wait until every entry queued so far is in the store and the log file.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if writer.send(FileOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer(
    durable: Arc<DurableLog>,
    file: PrivateLogFile,
    mut ops: mpsc::UnboundedReceiver<FileOp>,
) {
    while let Some(op) = ops.recv().await {
        match op {
            FileOp::Append { entry, line } => {
                let durable = durable.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || durable.persist(&entry)).await {
                    tracing::warn!(error = %e, "Log persistence task failed");
                }
                file.append_line(&line).await;
            }
            FileOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn echo(entry: &LogEntry) {
    let time = entry.display_time();
    match entry.kind {
        LogKind::Error => tracing::error!(
            time = %time,
            detail = entry.detail.as_deref().unwrap_or_default(),
            "{}",
            entry.message
        ),
        LogKind::Success | LogKind::Info => {
            tracing::info!(time = %time, kind = entry.kind.as_str(), "{}", entry.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn memory_log(store: Arc<MemoryStore>) -> LogStore {
        LogStore::open(&LogConfig::default(), Some(store), PrivateLogFile::unavailable())
    }

    #[tokio::test]
    async fn test_display_cap_keeps_full_history() {
        let log = memory_log(Arc::new(MemoryStore::new()));
        for i in 1..=9 {
            log.info(format!("event {i}"));
        }

        let visible = log.visible();
        assert_eq!(visible.len(), 8);
        assert_eq!(visible[0].message, "event 2");
        assert_eq!(visible[7].message, "event 9");
        assert_eq!(log.history_len(), 9);
        assert!(log.export_text().contains("[INFO] event 1"));
    }

    #[tokio::test]
    async fn test_restore_then_append() {
        let store = Arc::new(MemoryStore::new());
        {
            let earlier = memory_log(store.clone());
            earlier.info("Loading house.ifc…");
            earlier.success("Model ready: house.ifc");
            earlier.error("Select an element before registering.");
            earlier.flush().await;
        }

        let log = memory_log(store.clone());
        assert_eq!(log.history_len(), 3);
        assert_eq!(log.durable().persisted_len(), 3);

        log.success("CSV exported successfully.");
        log.flush().await;
        assert_eq!(log.history_len(), 4);
        assert_eq!(log.durable().persisted_len(), 4);
        assert!(log.history()[2].contains("[ERROR] Select an element before registering."));
    }

    #[tokio::test]
    async fn test_filter_hides_without_touching_history() {
        let log = memory_log(Arc::new(MemoryStore::new()));
        log.info("Loading tower.ifc…");
        log.success("IFC tree generated.");

        log.set_filter("TREE");
        assert_eq!(log.visible().len(), 1);
        log.set_filter("loading");
        assert_eq!(log.latest().unwrap().message, "IFC tree generated.");
        assert_eq!(log.displayed_len(), 2);
        assert_eq!(log.history_len(), 2);
    }

    #[tokio::test]
    async fn test_error_with_detail() {
        let log = memory_log(Arc::new(MemoryStore::new()));
        log.error_with("Could not load the IFC model.", &Error::MissingGuid);
        let history = log.history();
        assert!(history[0].ends_with("Could not load the IFC model.\nelement has no GlobalId"));
    }

    #[tokio::test]
    async fn test_file_receives_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::default();
        let file = PrivateLogFile::new(dir.path(), &config.log_dir, &config.log_file_name);
        let path = file.path().unwrap();
        let log = LogStore::open(&config, None, file);

        log.info("first");
        log.success("second");
        log.flush().await;

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] first"));
        assert!(lines[1].ends_with("[SUCCESS] second"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_persist_in_history_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            persisted_cap: 1000,
            ..LogConfig::default()
        };
        let file = PrivateLogFile::new(dir.path(), &config.log_dir, &config.log_file_name);
        let path = file.path().unwrap();
        let log = Arc::new(LogStore::open(&config, Some(Arc::new(MemoryStore::new())), file));

        let tasks: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                tokio::spawn(async move {
                    for i in 0..20 {
                        log.info(format!("task {t} event {i}"));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        log.flush().await;

        let history = log.history();
        assert_eq!(history.len(), 160);
        assert_eq!(log.durable().persisted_len(), 160);
        let stored: Vec<String> = log.durable().load().into_iter().map(|e| e.message).collect();
        let recorded: Vec<String> = log.visible().into_iter().map(|e| e.message).collect();
        assert_eq!(stored[stored.len() - recorded.len()..], recorded[..]);

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), history.join("\n").lines().collect::<Vec<_>>());
    }

    #[test]
    fn test_without_runtime_still_records() {
        let store = Arc::new(MemoryStore::new());
        let log = LogStore::new(&LogConfig::default(), Some(store), PrivateLogFile::unavailable());
        log.info("no runtime");
        assert_eq!(log.history_len(), 1);
        assert_eq!(log.durable().persisted_len(), 1);
    }
}
