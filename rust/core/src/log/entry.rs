// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Log entries, their display line and their persisted form.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Info,
    Success,
    Error,
}

impl LogKind {
    /// Upper-case tag used in formatted lines.
    pub fn label(self) -> &'static str {
        match self {
            LogKind::Info => "INFO",
            LogKind::Success => "SUCCESS",
            LogKind::Error => "ERROR",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Success => "success",
            LogKind::Error => "error",
        }
    }

    /// Unknown names fall back to `Info`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "success" => LogKind::Success,
            "error" => LogKind::Error,
            _ => LogKind::Info,
        }
    }
}

/// One immutable log event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub message: String,
    pub kind: LogKind,
    pub timestamp: OffsetDateTime,
    pub detail: Option<String>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, kind: LogKind, detail: Option<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
            detail: detail.filter(|d| !d.is_empty()),
        }
    }

    /// Local wall-clock time, `HH:MM:SS`.
    pub fn display_time(&self) -> String {
        format_display_time(self.timestamp)
    }

    /// `[HH:MM:SS] [KIND] message`, with the detail on the following lines.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "[{}] [{}] {}",
            self.display_time(),
            self.kind.label(),
            self.message
        );
        if let Some(detail) = &self.detail {
            line.push('\n');
            line.push_str(detail);
        }
        line
    }

    pub fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            message: Some(self.message.clone()),
            kind: Some(self.kind.as_str().to_string()),
            timestamp: self.timestamp.format(&Rfc3339).ok(),
            detail_text: Some(self.detail.clone().unwrap_or_default()),
        }
    }

    /// Rebuild an entry from whatever was found in durable storage.
    ///
    /// Bare strings become the message. Missing or malformed fields get
    /// `"Event"`, info kind, the current time and no detail.
    pub fn from_stored_value(value: &serde_json::Value) -> Self {
        let stored = match value {
            serde_json::Value::String(message) => StoredEntry {
                message: Some(message.clone()),
                ..StoredEntry::default()
            },
            serde_json::Value::Object(_) => {
                serde_json::from_value::<StoredEntry>(value.clone()).unwrap_or_default()
            }
            _ => StoredEntry::default(),
        };
        stored.into_entry()
    }
}

/// Persisted JSON shape of a log entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub detail_text: Option<String>,
}

impl StoredEntry {
    fn into_entry(self) -> LogEntry {
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);
        LogEntry {
            message: self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Event".into()),
            kind: self.kind.as_deref().map(LogKind::from_name).unwrap_or_default(),
            timestamp,
            detail: self.detail_text.filter(|d| !d.is_empty()),
        }
    }
}

fn local_offset() -> UtcOffset {
    static OFFSET: OnceLock<UtcOffset> = OnceLock::new();
    *OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

pub(crate) fn format_display_time(timestamp: OffsetDateTime) -> String {
    timestamp
        .to_offset(local_offset())
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}
