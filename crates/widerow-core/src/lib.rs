//! Widerow Core Library
//!
//! Maps typed records onto rows of a wide-column store and keeps secondary
//! index rows in step with them.
//!
//! # Architecture
//!
//! This crate defines:
//! - Codecs converting attribute values to and from stored bytes (`codec`)
//! - Declarative record and index schemas (`schema`)
//! - The registry that binds schemas to keyspaces (`registry`)
//! - Records with per-column dirty tracking (`record`)
//! - Index records, uniqueness checks and resolution (`index`)
//! - Batch loading (`loader`)
//! - The transport trait, an in-memory store and server failover (`transport`)
//! - Error types and configuration
//!
//! A persistent transport lives in `widerow-storage`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use widerow_core::schema::{Attribute, RecordSchema, RowKeyDescriptor};
//! use widerow_core::{MemoryTransport, Record, Registry, SchemaSync};
//!
//! let registry = Registry::default();
//! registry.add_cluster("main").unwrap();
//! registry.add_keyspace("main", "app", Arc::new(MemoryTransport::new())).unwrap();
//! let user = registry
//!     .register_record_type(
//!         RecordSchema::new("User")
//!             .row_key(RowKeyDescriptor::new("uuid"))
//!             .attribute("username", Attribute::text())
//!             .attribute("age", Attribute::integer().optional()),
//!     )
//!     .unwrap();
//! registry.sync_schema(SchemaSync::CreateMissing).unwrap();
//!
//! let mut dave = Record::with_key(Arc::clone(&user), "dave");
//! dave.set("username", "dave").unwrap();
//! dave.set("age", 41).unwrap();
//! dave.save().unwrap();
//!
//! let loaded = Record::load_key(user, "dave").unwrap();
//! assert_eq!(loaded.get("age").unwrap().and_then(|v| v.as_i64()), Some(41));
//! assert!(!loaded.is_dirty());
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod record;
pub mod registry;
pub mod schema;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::{ConnectionConfig, MappingConfig, WiderowConfig};
pub use error::{MappingError, MappingResult};
pub use index::IndexRecord;
pub use loader::{load_multi, LoadOptions};
pub use record::Record;
pub use registry::{RecordBinding, Registry, SchemaReport, SchemaSync};
pub use transport::{
    ConsistencyLevel, FailoverTransport, MemoryTransport, Transport, TransportError, TransportResult,
};
pub use types::{ColumnKey, Comparator, RecordRef, RowKey, Value};
