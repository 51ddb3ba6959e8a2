//! RocksDB transport configuration.
//!
//! # TOML Structure
//!
//! ```toml
//! block_cache_size = 268435456
//! max_open_files = 1000
//! enable_wal = true
//! create_if_missing = true
//! ```

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RocksResult, RocksTransportError};

/// Default shared block cache size (256MB).
pub const DEFAULT_BLOCK_CACHE_SIZE: usize = 256 * 1024 * 1024;

/// Default limit on open file handles.
pub const DEFAULT_MAX_OPEN_FILES: i32 = 1000;

/// Open options for [`RocksTransport`](crate::RocksTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksTransportConfig {
    /// Bytes of LRU block cache shared by every column family.
    pub block_cache_size: usize,

    /// File handle limit. `-1` means unlimited.
    pub max_open_files: i32,

    /// Write-ahead log. When disabled, writes survive a crash only after
    /// [`RocksTransport::flush_all`](crate::RocksTransport::flush_all).
    pub enable_wal: bool,

    pub create_if_missing: bool,
}

impl Default for RocksTransportConfig {
    fn default() -> Self {
        Self {
            block_cache_size: DEFAULT_BLOCK_CACHE_SIZE,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            enable_wal: true,
            create_if_missing: true,
        }
    }
}

impl RocksTransportConfig {
    pub fn from_file(path: impl AsRef<Path>) -> RocksResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RocksTransportError::InvalidConfig(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(toml: &str) -> RocksResult<Self> {
        toml::from_str(toml).map_err(|e| RocksTransportError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// # Errors
    /// - `RocksTransportError::InvalidConfig` for a zero cache size or a
    ///   file limit that is neither positive nor `-1`
    pub fn validate(&self) -> RocksResult<()> {
        if self.block_cache_size == 0 {
            return Err(RocksTransportError::InvalidConfig(
                "block_cache_size must be greater than 0".to_string(),
            ));
        }
        if self.max_open_files == 0 || self.max_open_files < -1 {
            return Err(RocksTransportError::InvalidConfig(format!(
                "max_open_files must be positive or -1, got {}",
                self.max_open_files
            )));
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `WIDEROW_ROCKS_BLOCK_CACHE_SIZE` | `block_cache_size` |
    /// | `WIDEROW_ROCKS_MAX_OPEN_FILES` | `max_open_files` |
    /// | `WIDEROW_ROCKS_ENABLE_WAL` | `enable_wal` |
    /// | `WIDEROW_ROCKS_CREATE_IF_MISSING` | `create_if_missing` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("WIDEROW_ROCKS_BLOCK_CACHE_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                self.block_cache_size = n;
            }
        }
        if let Ok(val) = env::var("WIDEROW_ROCKS_MAX_OPEN_FILES") {
            if let Ok(n) = val.parse::<i32>() {
                self.max_open_files = n;
            }
        }
        if let Ok(val) = env::var("WIDEROW_ROCKS_ENABLE_WAL") {
            if let Ok(b) = val.parse::<bool>() {
                self.enable_wal = b;
            }
        }
        if let Ok(val) = env::var("WIDEROW_ROCKS_CREATE_IF_MISSING") {
            if let Ok(b) = val.parse::<bool>() {
                self.create_if_missing = b;
            }
        }
        self
    }
}
