//! Tracker configuration

use std::path::Path;

use freight_kv_store::backend::lmdb::Lmdb;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How often a read-modify-write is attempted before giving up with a conflict.
    ///
    /// The default of 2 is the first attempt plus one retry.
    pub max_commit_attempts: u32,
    /// Sub-database that holds the freight records
    pub records_sub_db: String,
    /// Map size of the lmdb environment in bytes
    pub lmdb_map_size: usize,
    pub lmdb_max_dbs: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            max_commit_attempts: 2,
            records_sub_db: "freight-records".to_string(),
            lmdb_map_size: 64 << 20,
            lmdb_max_dbs: 4,
        }
    }
}

impl TrackerConfig {
    /// Parses the configuration from json. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of commit attempts, never less than one
    pub fn commit_attempts(&self) -> u32 {
        self.max_commit_attempts.max(1)
    }

    /// Opens (or creates) the lmdb environment at `path` with the configured limits
    pub fn open_lmdb(&self, path: &Path) -> Result<Lmdb> {
        Ok(Lmdb::with_map_size(
            path,
            self.lmdb_max_dbs,
            self.lmdb_map_size,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = TrackerConfig::from_json(r#"{ "max_commit_attempts": 5 }"#).unwrap();
        assert_eq!(config.max_commit_attempts, 5);
        assert_eq!(config.records_sub_db, "freight-records");
        assert_eq!(config.lmdb_max_dbs, 4);
    }

    #[test]
    fn zero_attempts_still_commit_once() {
        let config = TrackerConfig {
            max_commit_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.commit_attempts(), 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(TrackerConfig::from_json("{ max_commit_attempts: }").is_err());
    }
}
