// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use visor_ifc_core::{LogEntry, PendingSelection, RecordForm, SessionStatus};

use crate::services::Highlight;

/// Result of a model load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResponse {
    pub name: String,
    pub status: SessionStatus,
}

/// Pending selection, the record form, and what the client should flash.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResponse {
    pub pending: Option<PendingSelection>,
    pub form: RecordForm,
    pub highlight: Option<Highlight>,
    /// Newest log message, so the client can surface the outcome.
    pub message: Option<String>,
}

/// One row of the log panel.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntryView {
    pub time: String,
    pub kind: &'static str,
    pub message: String,
    pub detail: Option<String>,
    /// RFC 3339.
    pub timestamp: String,
}

impl From<&LogEntry> for LogEntryView {
    fn from(entry: &LogEntry) -> Self {
        Self {
            time: entry.display_time(),
            kind: entry.kind.as_str(),
            message: entry.message.clone(),
            detail: entry.detail.clone(),
            timestamp: entry.timestamp.format(&Rfc3339).unwrap_or_default(),
        }
    }
}
