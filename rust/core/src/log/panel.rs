// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use super::entry::LogEntry;

/// The most recent log entries on display, with a text filter.
#[derive(Debug)]
pub struct LogPanel {
    cap: usize,
    entries: VecDeque<PanelEntry>,
    filter: String,
}

#[derive(Debug)]
struct PanelEntry {
    entry: LogEntry,
    message_lower: String,
    time_text: String,
}

impl PanelEntry {
    fn matches(&self, filter: &str) -> bool {
        filter.is_empty() || self.message_lower.contains(filter) || self.time_text.contains(filter)
    }
}

impl LogPanel {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::with_capacity(cap.max(1) + 1),
            filter: String::new(),
        }
    }

    /// Show an entry, evicting the oldest once the cap is exceeded.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(PanelEntry {
            message_lower: entry.message.to_lowercase(),
            time_text: entry.display_time(),
            entry,
        });
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.trim().to_lowercase();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Displayed entries that pass the filter, oldest first.
    pub fn visible(&self) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.matches(&self.filter))
            .map(|e| e.entry.clone())
            .collect()
    }

    /// Most recent entry on display, filtered or not.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back().map(|e| &e.entry)
    }

    /// Displayed entries, filtered or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
