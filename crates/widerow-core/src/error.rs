//! Error types for the mapping layer.
//!
//! Every fallible operation in this crate returns [`MappingResult<T>`].
//! Errors carry the record type, row key, or attribute involved so a failure
//! can be traced without a debugger.
//!
//! # Error Categories
//!
//! - **Declaration**: `Schema`, `Configuration` - raised while binding record
//!   types; these abort startup and are never recovered.
//! - **Per-call**: `MissingRowKey`, `MissingRequiredAttributes`,
//!   `AttributeNotSet`, `Precondition`, `InvalidArgument`, `Codec`,
//!   `ColumnCeilingExceeded` - surfaced to the caller of a single operation.
//! - **Index maintenance**: `MissingIndexedField`, `IndexMaintenance` - raised
//!   from the save-hook phase, after the primary row is already durable.
//! - **Transport**: `Transport` - connectivity and backend failures, passed
//!   through unchanged. The mapping layer never retries.
//!
//! Two conditions are deliberately *not* errors: a stored column with no
//! declared attribute is logged and skipped on load, and appending a
//! duplicate to a unique index is a silent no-op.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised by the mapping layer.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Malformed or incomplete record type declaration, or a conversion
    /// through the poison codec of an unbound attribute.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Registry or config problem, such as no keyspace registered.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Save or load attempted with no resolvable row key.
    #[error("No row key set for '{record_type}' and no autogeneration or default configured")]
    MissingRowKey {
        /// Record type that lacks a row key.
        record_type: String,
    },

    /// One or more mandatory attributes are unset at save time.
    ///
    /// The whole save is abandoned; nothing is written.
    #[error("'{record_type}' is missing mandatory attributes: {}", .attributes.join(", "))]
    MissingRequiredAttributes {
        /// Record type being saved.
        record_type: String,
        /// Every mandatory attribute without a value or default.
        attributes: Vec<String>,
    },

    /// A mandatory field that feeds a secondary index is absent on the
    /// record being indexed.
    #[error("Index '{index}' on '{record_type}' requires field '{field}', which is not set")]
    MissingIndexedField {
        /// Owning record type.
        record_type: String,
        /// Generated index name.
        index: String,
        /// Field whose value selects the index row.
        field: String,
    },

    /// Strict read of an attribute that holds no value.
    #[error("Attribute '{attribute}' of '{record_type}' has no value")]
    AttributeNotSet {
        /// Record type being read.
        record_type: String,
        /// Attribute that was requested.
        attribute: String,
    },

    /// Operation called in a state that does not support it.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Caller passed an argument the operation cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A codec could not convert a value.
    #[error("{codec} codec: {message}")]
    Codec {
        /// Codec that rejected the value.
        codec: &'static str,
        /// What went wrong.
        message: String,
    },

    /// An index row reached the configured column ceiling while enforcing
    /// uniqueness. This is a configuration problem, not a transient one.
    #[error(
        "Index row '{row_key}' in '{column_family}' holds {count} columns, \
         reaching the uniqueness ceiling of {ceiling}"
    )]
    ColumnCeilingExceeded {
        /// Index column family.
        column_family: String,
        /// Index row key.
        row_key: String,
        /// Columns fetched.
        count: usize,
        /// Configured ceiling.
        ceiling: usize,
    },

    /// The primary row was written but an index hook failed afterwards.
    ///
    /// The record keeps the failed hook (and every hook after it) marked
    /// stale; the next `save()` re-runs them.
    #[error("Saved '{record_type}' row '{row_key}' but index '{index}' was not updated: {source}")]
    IndexMaintenance {
        /// Owning record type.
        record_type: String,
        /// Row key of the saved record.
        row_key: String,
        /// Index whose hook failed.
        index: String,
        /// Underlying failure.
        #[source]
        source: Box<MappingError>,
    },

    /// Failure reported by the transport. Propagated unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl MappingError {
    /// Create a codec error.
    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Self::Codec {
            codec,
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Prefix conversion errors with the attribute they concern.
    ///
    /// Only `Schema` and `Codec` errors are rewritten; everything else is
    /// returned as is.
    pub fn for_attribute(self, record_type: &str, attribute: &str) -> Self {
        match self {
            Self::Schema(message) => {
                Self::Schema(format!("{}.{}: {}", record_type, attribute, message))
            }
            Self::Codec { codec, message } => Self::Codec {
                codec,
                message: format!("{}.{}: {}", record_type, attribute, message),
            },
            other => other,
        }
    }

    /// Whether the primary write of a save already happened when this error
    /// was raised.
    pub fn primary_write_committed(&self) -> bool {
        matches!(self, Self::IndexMaintenance { .. })
    }
}

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
