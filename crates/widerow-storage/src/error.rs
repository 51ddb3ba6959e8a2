//! Error types for the RocksDB transport.
//!
//! # Error Categories
//!
//! - **Lifecycle**: `OpenFailed`, `FlushFailed`
//! - **Data operations**: `WriteFailed`, `ReadFailed`
//! - **Data integrity**: `Serialization`, `UnsupportedFormat`
//! - **Schema**: `ColumnFamilyNotFound`, `SchemaConflict`, `InvalidRequest`
//! - **Configuration**: `InvalidConfig`
//!
//! Every variant converts into [`TransportError`] so the mapping layer sees
//! one error type regardless of backend.

use thiserror::Error;
use widerow_core::TransportError;

/// RocksDB transport errors.
///
/// # Error Matching
///
/// ```rust
/// use widerow_storage::RocksTransportError;
///
/// fn triage(err: &RocksTransportError) -> &'static str {
///     match err {
///         RocksTransportError::OpenFailed { .. } => "check path and permissions",
///         RocksTransportError::ColumnFamilyNotFound { .. } => "run schema sync",
///         RocksTransportError::Serialization(_)
///         | RocksTransportError::UnsupportedFormat { .. } => "data corruption",
///         _ => "see message",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum RocksTransportError {
    /// Database failed to open at the specified path.
    ///
    /// # When This Occurs
    ///
    /// - Path does not exist and `create_if_missing` is false
    /// - The directory is locked by another process
    /// - Insufficient permissions
    #[error("Failed to open database at '{path}': {message}")]
    OpenFailed {
        /// The path where open was attempted
        path: String,
        /// The underlying RocksDB message
        message: String,
    },

    /// The store column family has not been created.
    #[error("Column family '{keyspace}.{name}' not found")]
    ColumnFamilyNotFound {
        /// Keyspace searched
        keyspace: String,
        /// Missing family
        name: String,
    },

    /// A family exists with a different comparator or column type.
    #[error("Column family '{keyspace}.{name}' already exists as {existing}")]
    SchemaConflict {
        keyspace: String,
        name: String,
        /// Comparator and column type found on disk
        existing: String,
    },

    /// Malformed request (empty row key, bad column key width, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cell written by an incompatible format version.
    #[error("Unsupported cell format version {found} (expected {expected})")]
    UnsupportedFormat { found: u8, expected: u8 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<bincode::Error> for RocksTransportError {
    fn from(e: bincode::Error) -> Self {
        RocksTransportError::Serialization(e.to_string())
    }
}

impl From<RocksTransportError> for TransportError {
    fn from(e: RocksTransportError) -> Self {
        match e {
            RocksTransportError::ColumnFamilyNotFound { keyspace, name } => {
                TransportError::UnknownColumnFamily { keyspace, name }
            }
            RocksTransportError::InvalidRequest(message) => TransportError::InvalidRequest(message),
            e @ RocksTransportError::SchemaConflict { .. } => TransportError::InvalidRequest(e.to_string()),
            other => TransportError::Backend(other.to_string()),
        }
    }
}

/// Result type for RocksDB transport operations.
pub type RocksResult<T> = Result<T, RocksTransportError>;
