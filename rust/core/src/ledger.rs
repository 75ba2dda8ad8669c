// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Committed construction-status records of the loaded model.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

pub const CSV_HEADER: &str = "GUID,FECHA,ESTADO,COMENTARIO";

/// Construction status of a recorded element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Built,
    Pending,
}

impl RecordStatus {
    /// Value written to the CSV `ESTADO` column.
    pub fn csv_label(self) -> &'static str {
        match self {
            RecordStatus::Built => "CONSTRUIDO",
            RecordStatus::Pending => "PENDIENTE",
        }
    }
}

/// One committed record. Immutable once in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub element_id: String,
    pub date: Date,
    pub status: RecordStatus,
    pub comment: String,
}

impl Record {
    fn csv_row(&self) -> String {
        let date = format_date(self.date);
        [
            escape_csv(&self.element_id),
            escape_csv(&date),
            escape_csv(self.status.csv_label()),
            escape_csv(&self.comment),
        ]
        .join(",")
    }
}

/// `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

/// Parse a `YYYY-MM-DD` date, surrounding whitespace ignored.
pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Quote `value` when it contains a comma, a quote or a newline, doubling
/// inner quotes.
pub fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Append-only list of records, emptied when a new model loads.
#[derive(Debug, Default)]
pub struct RecordLedger {
    records: Mutex<Vec<Record>>,
}

impl RecordLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&self, record: Record) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn reset(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Header plus one row per record, joined with `\n`.
    pub fn export_csv(&self) -> String {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        std::iter::once(CSV_HEADER.to_string())
            .chain(records.iter().map(Record::csv_row))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
