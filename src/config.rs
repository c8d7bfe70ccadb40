//! Service configuration loaded from the environment.

use std::path::PathBuf;

use anyhow::Context;

use crate::archive::{ArchiveLayout, DEFAULT_ENTRY_NAME, DEFAULT_EXTENSION};

/// Largest upload accepted by default (32 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 << 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// SQLite database file holding the `prices` table.
    pub db_path: PathBuf,

    /// Expected payload entry name inside uploaded archives.
    pub archive_entry: String,

    /// Fallback payload extension, without the dot.
    pub archive_extension: String,

    /// Upper bound on an uploaded request body.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0:8080".to_string(),
            db_path: PathBuf::from("prices.db"),
            archive_entry: DEFAULT_ENTRY_NAME.to_string(),
            archive_extension: DEFAULT_EXTENSION.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `PRICES_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `PRICES_DB_PATH`: SQLite file (default: "prices.db")
    /// - `PRICES_ARCHIVE_ENTRY`: Canonical payload name (default: "data.csv")
    /// - `PRICES_ARCHIVE_EXTENSION`: Fallback extension (default: "csv")
    /// - `PRICES_MAX_UPLOAD_BYTES`: Body limit in bytes (default: 33554432)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_upload_bytes = match var("PRICES_MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("PRICES_MAX_UPLOAD_BYTES is not a number: {:?}", raw))?,
            None => defaults.max_upload_bytes,
        };

        if max_upload_bytes == 0 {
            anyhow::bail!("PRICES_MAX_UPLOAD_BYTES must be greater than zero");
        }

        let config = Config {
            bind_addr: var("PRICES_BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_path: var("PRICES_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            archive_entry: var("PRICES_ARCHIVE_ENTRY").unwrap_or(defaults.archive_entry),
            archive_extension: var("PRICES_ARCHIVE_EXTENSION")
                .unwrap_or(defaults.archive_extension),
            max_upload_bytes,
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            db_path = %config.db_path.display(),
            archive_entry = %config.archive_entry,
            max_upload_bytes = config.max_upload_bytes,
            "configuration loaded"
        );

        Ok(config)
    }

    pub fn archive_layout(&self) -> ArchiveLayout {
        ArchiveLayout::new(self.archive_entry.clone(), self.archive_extension.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("prices.db"));
        assert_eq!(config.max_upload_bytes, 32 * 1024 * 1024);
        assert_eq!(config.archive_layout(), ArchiveLayout::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PRICES_BIND_ADDR", "127.0.0.1:9000"),
            ("PRICES_ARCHIVE_ENTRY", "prices.csv"),
            ("PRICES_ARCHIVE_EXTENSION", ".CSV"),
            ("PRICES_MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.archive_layout(), ArchiveLayout::new("prices.csv", "csv"));
    }

    #[test]
    fn test_bad_upload_limit() {
        assert!(Config::from_lookup(lookup(&[("PRICES_MAX_UPLOAD_BYTES", "lots")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PRICES_MAX_UPLOAD_BYTES", "0")])).is_err());
    }
}
