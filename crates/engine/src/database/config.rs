//! JSON database configuration (spec §6).
//!
//! A root directory, optional per-disk size caps, and an opaque
//! substrate-specific `engine.config` blob, parsed with `serde`/`serde_json`
//! the way the rest of this workspace handles structured config and wire
//! formats.

use polykv_core::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One entry in `data_directories`: a path plus an optional size cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDirectoryConfig {
    /// Filesystem path of this data directory.
    pub path: String,
    /// Soft cap on the directory's size, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<MaxSize>,
}

/// A size limit, accepted either as a raw byte count or a human string like
/// `"512MB"` (spec §6: "in bytes or a human-readable string").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxSize {
    /// Exact byte count.
    Bytes(u64),
    /// A `"<number><KB|MB|GB|TB>"` string, case-insensitive.
    Human(String),
}

impl MaxSize {
    /// Resolve to a byte count, parsing the human form if needed.
    pub fn bytes(&self) -> Result<u64> {
        match self {
            MaxSize::Bytes(n) => Ok(*n),
            MaxSize::Human(s) => parse_size_str(s),
        }
    }
}

fn parse_size_str(raw: &str) -> Result<u64> {
    let s = raw.trim();
    let upper = s.to_ascii_uppercase();
    const UNITS: &[(&str, u64)] =
        &[("TB", 1024u64.pow(4)), ("GB", 1024u64.pow(3)), ("MB", 1024u64.pow(2)), ("KB", 1024), ("B", 1)];
    for (suffix, multiplier) in UNITS {
        if let Some(number) = upper.strip_suffix(suffix) {
            let number: f64 = number
                .trim()
                .parse()
                .map_err(|_| Error::invalid_argument(format!("'{raw}' is not a valid size")))?;
            if number < 0.0 {
                return Err(Error::invalid_argument(format!("'{raw}' is not a valid size")));
            }
            return Ok((number * *multiplier as f64) as u64);
        }
    }
    s.parse().map_err(|_| Error::invalid_argument(format!("'{raw}' is not a valid size")))
}

/// The `engine` subobject: either inline `config` or a `config_file_path`
/// pointing at substrate-specific configuration (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inline, substrate-specific configuration. Opaque to this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    /// Path to a file holding the same shape as `config`, as an alternative
    /// to inlining it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<String>,
}

/// Root configuration object parsed from the JSON string described in
/// spec §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Root directory the database lives under.
    pub directory: String,
    /// Additional data directories, each with its own optional size cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_directories: Option<Vec<DataDirectoryConfig>>,
    /// Substrate-specific configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineConfig>,
}

impl DatabaseConfig {
    /// The minimal configuration: just a root directory.
    pub fn for_directory(directory: impl Into<String>) -> Self {
        DatabaseConfig { directory: directory.into(), data_directories: None, engine: None }
    }

    /// Parse from the JSON string callers pass to `open` (spec §6).
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::invalid_argument(format!("invalid database config: {e}")))
    }

    /// Serialize back to the same JSON shape.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::invalid_argument(format!("cannot serialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg = DatabaseConfig::from_json(r#"{"directory": "/var/lib/polykv"}"#).unwrap();
        assert_eq!(cfg.directory, "/var/lib/polykv");
        assert!(cfg.data_directories.is_none());
    }

    #[test]
    fn parses_data_directories_with_mixed_max_size_forms() {
        let raw = r#"{
            "directory": "/var/lib/polykv",
            "data_directories": [
                {"path": "/mnt/disk0", "max_size": 1048576},
                {"path": "/mnt/disk1", "max_size": "2GB"}
            ]
        }"#;
        let cfg = DatabaseConfig::from_json(raw).unwrap();
        let dirs = cfg.data_directories.unwrap();
        assert_eq!(dirs[0].max_size.as_ref().unwrap().bytes().unwrap(), 1_048_576);
        assert_eq!(dirs[1].max_size.as_ref().unwrap().bytes().unwrap(), 2 * 1024u64.pow(3));
    }

    #[test]
    fn parses_engine_config() {
        let raw = r#"{"directory": "/d", "engine": {"config": {"cache_mb": 64}}}"#;
        let cfg = DatabaseConfig::from_json(raw).unwrap();
        let engine = cfg.engine.unwrap();
        assert_eq!(engine.config.unwrap()["cache_mb"], 64);
        assert!(engine.config_file_path.is_none());
    }

    #[test]
    fn rejects_missing_directory() {
        assert!(DatabaseConfig::from_json(r#"{"engine": {}}"#).is_err());
    }

    #[test]
    fn rejects_malformed_size_string() {
        let size = MaxSize::Human("not-a-size".to_string());
        assert!(size.bytes().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = DatabaseConfig::for_directory("/d");
        let raw = cfg.to_json().unwrap();
        assert_eq!(DatabaseConfig::from_json(&raw).unwrap(), cfg);
    }
}
