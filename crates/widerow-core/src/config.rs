//! Configuration for the mapping layer and its connection.
//!
//! Both structs load from TOML and accept environment overrides with the
//! `WIDEROW_` prefix. Invalid values are reported by `validate()`; nothing
//! is silently clamped.
//!
//! # TOML Structure
//!
//! ```toml
//! [mapping]
//! default_column_count = 10000
//! uniqueness_ceiling = 20000000
//! read_consistency = "one"
//! write_consistency = "quorum"
//!
//! [connection]
//! servers = ["db1:9160", "db2:9160"]
//! round_robin = true
//! timeout_ms = 5000
//! ```

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};
use crate::transport::ConsistencyLevel;

/// Column count fetched by a plain `load()` when no predicate is given.
pub const DEFAULT_COLUMN_COUNT: usize = 10_000;

/// Most columns read while checking a unique index for duplicates.
pub const DEFAULT_UNIQUENESS_CEILING: usize = 20_000_000;

/// Default server when none is configured.
pub const DEFAULT_SERVER: &str = "localhost:9160";

fn config_error(message: impl Into<String>) -> MappingError {
    MappingError::Configuration(message.into())
}

fn read_file(path: &Path) -> MappingResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| config_error(format!("Failed to read config file '{}': {}", path.display(), e)))
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

/// Root configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WiderowConfig {
    #[serde(default)]
    pub mapping: MappingConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl WiderowConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `MappingError::Configuration` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> MappingResult<Self> {
        let path = path.as_ref();
        toml::from_str(&read_file(path)?)
            .map_err(|e| config_error(format!("Failed to parse TOML in '{}': {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// - `MappingError::Configuration` if TOML parsing fails
    pub fn from_toml_str(toml: &str) -> MappingResult<Self> {
        toml::from_str(toml).map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))
    }

    /// Validate both sections, naming the section in the error.
    pub fn validate(&self) -> MappingResult<()> {
        self.mapping
            .validate()
            .map_err(|e| config_error(format!("[mapping] {}", e)))?;
        self.connection
            .validate()
            .map_err(|e| config_error(format!("[connection] {}", e)))?;
        Ok(())
    }

    /// Apply `WIDEROW_*` overrides to both sections.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        Self {
            mapping: self.mapping.with_env_overrides(),
            connection: self.connection.with_env_overrides(),
        }
    }
}

// ============================================================================
// MAPPING CONFIG
// ============================================================================

/// Limits and defaults applied by records, indexes and the batch loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Columns fetched per row by `load()` and index resolution.
    pub default_column_count: usize,

    /// Ceiling for the full-row scan behind unique index appends. A row may
    /// hold exactly this many columns; going over it is an error, never a
    /// silent truncation.
    pub uniqueness_ceiling: usize,

    /// Read consistency for types that do not declare their own.
    pub read_consistency: ConsistencyLevel,

    /// Write consistency for types that do not declare their own.
    pub write_consistency: ConsistencyLevel,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            default_column_count: DEFAULT_COLUMN_COUNT,
            uniqueness_ceiling: DEFAULT_UNIQUENESS_CEILING,
            read_consistency: ConsistencyLevel::One,
            write_consistency: ConsistencyLevel::One,
        }
    }
}

impl MappingConfig {
    /// Load from a TOML file holding just the mapping section's keys.
    pub fn from_file(path: impl AsRef<Path>) -> MappingResult<Self> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    pub fn from_toml_str(toml: &str) -> MappingResult<Self> {
        toml::from_str(toml).map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))
    }

    /// # Errors
    /// - `MappingError::Configuration` if a count is zero or the uniqueness
    ///   ceiling is below the default column count
    pub fn validate(&self) -> MappingResult<()> {
        if self.default_column_count == 0 {
            return Err(config_error("default_column_count must be greater than 0"));
        }
        if self.uniqueness_ceiling < self.default_column_count {
            return Err(config_error(format!(
                "uniqueness_ceiling ({}) must be at least default_column_count ({})",
                self.uniqueness_ceiling, self.default_column_count
            )));
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `WIDEROW_DEFAULT_COLUMN_COUNT` | `default_column_count` |
    /// | `WIDEROW_UNIQUENESS_CEILING` | `uniqueness_ceiling` |
    /// | `WIDEROW_READ_CONSISTENCY` | `read_consistency` |
    /// | `WIDEROW_WRITE_CONSISTENCY` | `write_consistency` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("WIDEROW_DEFAULT_COLUMN_COUNT") {
            if let Ok(n) = val.parse::<usize>() {
                self.default_column_count = n;
            }
        }
        if let Ok(val) = env::var("WIDEROW_UNIQUENESS_CEILING") {
            if let Ok(n) = val.parse::<usize>() {
                self.uniqueness_ceiling = n;
            }
        }
        if let Ok(val) = env::var("WIDEROW_READ_CONSISTENCY") {
            if let Some(level) = ConsistencyLevel::parse(&val) {
                self.read_consistency = level;
            }
        }
        if let Ok(val) = env::var("WIDEROW_WRITE_CONSISTENCY") {
            if let Some(level) = ConsistencyLevel::parse(&val) {
                self.write_consistency = level;
            }
        }
        self
    }
}

// ============================================================================
// CONNECTION CONFIG
// ============================================================================

/// Server list and failover policy for
/// [`FailoverTransport`](crate::transport::FailoverTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// `host:port` entries, tried in order.
    pub servers: Vec<String>,

    /// Start each failover sweep one server further along the list.
    pub round_robin: bool,

    /// Give up after this many milliseconds. `None` waits until every
    /// server has been tried.
    pub timeout_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_SERVER.to_string()],
            round_robin: true,
            timeout_ms: None,
        }
    }
}

impl ConnectionConfig {
    /// Config for an explicit server list, other fields default.
    pub fn with_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> MappingResult<Self> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    pub fn from_toml_str(toml: &str) -> MappingResult<Self> {
        toml::from_str(toml).map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))
    }

    /// # Errors
    /// - `MappingError::Configuration` for an empty server list, a blank
    ///   server entry, or a zero timeout
    pub fn validate(&self) -> MappingResult<()> {
        if self.servers.is_empty() {
            return Err(config_error("servers must list at least one server"));
        }
        if let Some(pos) = self.servers.iter().position(|s| s.trim().is_empty()) {
            return Err(config_error(format!("servers[{}] is blank", pos)));
        }
        if self.timeout_ms == Some(0) {
            return Err(config_error("timeout_ms must be greater than 0 when set"));
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Field | Format |
    /// |----------|-------|--------|
    /// | `WIDEROW_SERVERS` | `servers` | comma-separated |
    /// | `WIDEROW_ROUND_ROBIN` | `round_robin` | bool |
    /// | `WIDEROW_TIMEOUT_MS` | `timeout_ms` | u64, or `none` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("WIDEROW_SERVERS") {
            let servers: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !servers.is_empty() {
                self.servers = servers;
            }
        }
        if let Ok(val) = env::var("WIDEROW_ROUND_ROBIN") {
            if let Ok(b) = val.parse::<bool>() {
                self.round_robin = b;
            }
        }
        if let Ok(val) = env::var("WIDEROW_TIMEOUT_MS") {
            if val.eq_ignore_ascii_case("none") {
                self.timeout_ms = None;
            } else if let Ok(n) = val.parse::<u64>() {
                self.timeout_ms = Some(n);
            }
        }
        self
    }
}
