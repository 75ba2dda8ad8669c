// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use visor_ifc_core::LogConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Holds the persisted log history and the private log directory.
    pub data_dir: PathBuf,
    /// Maximum model size in MB, for uploads and URL fetches.
    pub max_file_size_mb: usize,
    /// Request timeout in seconds. Also bounds URL fetches.
    pub request_timeout_secs: u64,
    /// Log entries kept on display.
    pub log_display_cap: usize,
    /// Log entries kept in durable storage.
    pub log_persisted_cap: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let log = LogConfig::default();
        Self {
            port: env_or("PORT", 8080),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    if std::path::Path::new("/.dockerenv").exists() {
                        PathBuf::from("/app/data")
                    } else {
                        std::env::current_dir()
                            .map(|dir| dir.join(".data"))
                            .unwrap_or_else(|_| PathBuf::from("./.data"))
                    }
                }),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", 500),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 300),
            log_display_cap: env_or("LOG_DISPLAY_CAP", log.display_cap),
            log_persisted_cap: env_or("LOG_PERSISTED_CAP", log.persisted_cap),
        }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            display_cap: self.log_display_cap,
            persisted_cap: self.log_persisted_cap,
            ..LogConfig::default()
        }
    }

    /// File holding the key-value store the log history is persisted in.
    pub fn storage_file(&self) -> PathBuf {
        self.data_dir.join("local-storage.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back() {
        std::env::set_var("VISOR_TEST_CAP", "not a number");
        assert_eq!(env_or("VISOR_TEST_CAP", 8usize), 8);
        std::env::set_var("VISOR_TEST_CAP", " 12 ");
        assert_eq!(env_or("VISOR_TEST_CAP", 8usize), 12);
        assert_eq!(env_or("VISOR_TEST_MISSING", 200usize), 200);
    }

    #[test]
    fn test_log_config_keeps_names() {
        let config = Config {
            port: 8080,
            data_dir: PathBuf::from("/tmp/visor"),
            max_file_size_mb: 1,
            request_timeout_secs: 30,
            log_display_cap: 4,
            log_persisted_cap: 50,
        };
        let log = config.log_config();
        assert_eq!(log.display_cap, 4);
        assert_eq!(log.persisted_cap, 50);
        assert_eq!(log.storage_key, "visor-ifc-log-history");
        assert_eq!(config.max_file_bytes(), 1024 * 1024);
    }
}
