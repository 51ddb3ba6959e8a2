//! Transport error types.

use thiserror::Error;

/// Errors raised at the connection boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Every configured server failed.
    #[error("No server available after trying [{}]: {last_error}", .attempted.join(", "))]
    NoServerAvailable {
        /// Servers tried, in order.
        attempted: Vec<String>,
        /// Error from the final attempt.
        last_error: String,
    },

    /// The configured timeout elapsed before any server answered.
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout {
        /// Time spent before giving up.
        elapsed_ms: u64,
    },

    /// A single server could not be reached or dropped the connection.
    #[error("Connection to '{server}' failed: {message}")]
    Connection {
        /// Server address.
        server: String,
        /// What went wrong.
        message: String,
    },

    /// The store rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The column family has not been created.
    #[error("Column family '{keyspace}.{name}' does not exist")]
    UnknownColumnFamily {
        /// Keyspace searched.
        keyspace: String,
        /// Missing family.
        name: String,
    },

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl TransportError {
    /// Whether another server might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Connection { .. })
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
