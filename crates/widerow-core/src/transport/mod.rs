//! The connection boundary.
//!
//! The mapping layer talks to the store only through [`Transport`]: one
//! batched write per row, one multi-row slice fetch per load, and schema
//! introspection used by [`Registry::sync_schema`](crate::Registry::sync_schema).
//! Retry and failover are the transport's business; the mapping layer
//! propagates every [`TransportError`] unchanged.
//!
//! # Implementors
//!
//! - [`MemoryTransport`]: in-process store with a write log, for tests and
//!   embedding.
//! - [`FailoverTransport`]: wraps a server list and retries connectivity
//!   failures on the next server.
//! - `RocksTransport` in the `widerow-storage` crate: persistent store.

mod error;
mod failover;
mod memory;

pub use error::{TransportError, TransportResult};
pub use failover::{Connector, FailoverTransport};
pub use memory::{MemoryTransport, WriteRecord};

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{ColumnKey, Comparator, RowKey};

// ============================================================================
// WIRE TYPES
// ============================================================================

/// One column as written to or read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column key, already encoded by the attribute's key codec.
    pub name: ColumnKey,
    /// Column value, already encoded by the attribute's value codec.
    pub value: Vec<u8>,
    /// Write time in microseconds since the Unix epoch. When two writes hit
    /// the same column the larger timestamp wins.
    pub timestamp: i64,
}

impl Column {
    /// Column stamped with the current time.
    pub fn new(name: impl Into<ColumnKey>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp: now_micros(),
        }
    }
}

/// Columns fetched for one row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlice {
    pub row_key: RowKey,
    /// Columns in comparator order (reversed for reverse ranges).
    pub columns: Vec<Column>,
}

/// Bounded column range within a row.
///
/// An empty `start` or `finish` is unbounded on that side. For reverse
/// ranges `start` is the upper bound and `finish` the lower one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRange {
    pub start: ColumnKey,
    pub finish: ColumnKey,
    pub reverse: bool,
    pub count: usize,
}

impl SliceRange {
    /// Whole row, forward, at most `count` columns.
    pub fn all(count: usize) -> Self {
        Self {
            start: Vec::new(),
            finish: Vec::new(),
            reverse: false,
            count,
        }
    }

    /// Same range, walked from the other end.
    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

/// Which columns of each row a fetch returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlicePredicate {
    /// Exactly these column keys, where present.
    Names(Vec<ColumnKey>),
    /// A contiguous range.
    Range(SliceRange),
}

impl SlicePredicate {
    /// Whole row up to `count` columns.
    pub fn all(count: usize) -> Self {
        SlicePredicate::Range(SliceRange::all(count))
    }
}

/// Replica agreement requested for a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Any,
    #[default]
    One,
    Quorum,
    All,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "any",
            ConsistencyLevel::One => "one",
            ConsistencyLevel::Quorum => "quorum",
            ConsistencyLevel::All => "all",
        }
    }

    /// Parse a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "any" => Some(ConsistencyLevel::Any),
            "one" => Some(ConsistencyLevel::One),
            "quorum" => Some(ConsistencyLevel::Quorum),
            "all" => Some(ConsistencyLevel::All),
            _ => None,
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCHEMA DESCRIPTIONS
// ============================================================================

/// Declared shape of one column family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFamilyDef {
    pub keyspace: String,
    pub name: String,
    pub column_type: String,
    pub comparator: Comparator,
    pub comment: Option<String>,
}

/// Column families currently defined in a keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyspaceDescription {
    pub name: String,
    pub column_families: Vec<ColumnFamilyDef>,
}

// ============================================================================
// TRANSPORT TRAIT
// ============================================================================

/// Narrow RPC surface of a wide-column store.
///
/// Implementations must be object safe and shareable across threads; the
/// registry holds them as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Write `columns` to one row in one batch.
    ///
    /// # Errors
    ///
    /// - `TransportError::UnknownColumnFamily` if the family does not exist
    /// - `TransportError::InvalidRequest` for an empty row key or a column key
    ///   the family's comparator rejects
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> TransportResult<()>;

    /// Fetch the same slice from several rows in one round trip.
    ///
    /// Rows may come back in any order. A requested key with no stored
    /// columns is either omitted or returned with an empty column list.
    fn multiget_columns(
        &self,
        keyspace: &str,
        column_family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> TransportResult<Vec<KeySlice>>;

    /// List the column families of a keyspace.
    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription>;

    /// Describe one column family, or `None` if it does not exist.
    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>>;

    /// Create a column family. Creating one that already exists with the
    /// same definition is not an error.
    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()>;

    /// Drop a column family and all its rows.
    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()>;
}

/// Current time in microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}
