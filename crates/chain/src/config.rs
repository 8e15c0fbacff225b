//! Simple config loader using TOML and serde.
//! Covers what a host needs to open a ledger: where the store lives and how
//! large the subscriber cache is.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::db::DEFAULT_MAP_SIZE;

pub const DEFAULT_SUBSCRIBER_CACHE_CAPACITY: usize = 8096;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory of the LMDB environment.
    pub data_dir: String,

    /// LMDB map size in bytes.
    pub map_size: usize,

    /// Capacity of the subscriber LRU cache.
    pub subscriber_cache_capacity: usize,

    /// Max tracing level ("error" .. "trace").
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            data_dir: "./data".to_string(),
            map_size: DEFAULT_MAP_SIZE,
            subscriber_cache_capacity: DEFAULT_SUBSCRIBER_CACHE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// Load config from a TOML file path.
/// Missing keys fall back to defaults; a missing file is an error.
pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<LedgerConfig> {
    let p = path.as_ref();
    let s = fs::read_to_string(p).with_context(|| format!("read config {}", p.display()))?;
    let cfg: LedgerConfig = toml::from_str(&s).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let def = LedgerConfig::default();
        assert_eq!(def.subscriber_cache_capacity, 8096);
        assert_eq!(def.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        use std::io::Write;
        let tmp = tempfile::NamedTempFile::new().expect("temp file");
        let toml = r#"
            data_dir = "./mydata"
            subscriber_cache_capacity = 16
            log_level = "debug"
        "#;
        let mut f = tmp.reopen().expect("reopen");
        write!(f, "{}", toml).expect("write");
        let cfg = load_from_file(tmp.path()).expect("load");
        assert_eq!(cfg.data_dir, "./mydata");
        assert_eq!(cfg.subscriber_cache_capacity, 16);
        assert_eq!(cfg.map_size, DEFAULT_MAP_SIZE);
        assert_eq!(cfg.tracing_level(), tracing::Level::DEBUG);
    }
}
