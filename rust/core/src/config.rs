// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Log retention and storage locations.

/// Entries kept visible in the log panel.
pub const DEFAULT_DISPLAY_CAP: usize = 8;
/// Entries kept in durable key-value storage.
pub const DEFAULT_PERSISTED_CAP: usize = 200;
/// Key under which the persisted entries are stored.
pub const DEFAULT_STORAGE_KEY: &str = "visor-ifc-log-history";
/// Directory of the private append-only log file.
pub const DEFAULT_LOG_DIR: &str = "visor-ifc-logs";
/// Name of the private append-only log file.
pub const DEFAULT_LOG_FILE_NAME: &str = "visor-ifc-log.txt";

/// Log store configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum number of entries in the display panel.
    pub display_cap: usize,
    /// Maximum number of entries kept in durable storage.
    pub persisted_cap: usize,
    /// Durable storage key.
    pub storage_key: String,
    /// Log file directory, relative to the private storage root.
    pub log_dir: String,
    /// Log file name inside `log_dir`.
    pub log_file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            display_cap: DEFAULT_DISPLAY_CAP,
            persisted_cap: DEFAULT_PERSISTED_CAP,
            storage_key: DEFAULT_STORAGE_KEY.into(),
            log_dir: DEFAULT_LOG_DIR.into(),
            log_file_name: DEFAULT_LOG_FILE_NAME.into(),
        }
    }
}
