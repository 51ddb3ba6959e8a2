//! Widerow Storage Library
//!
//! Persistent [`Transport`](widerow_core::Transport) backed by RocksDB.
//!
//! # Architecture
//!
//! - One RocksDB column family per store column family (`keyspace.family`)
//! - Cell keys laid out so RocksDB's byte order matches each family's
//!   comparator (`keys`)
//! - Family definitions persisted in a `__schema` family
//!   (`column_families`)
//! - Cells stored as versioned bincode envelopes carrying the write
//!   timestamp (`rocksdb_transport`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tempfile::TempDir;
//! use widerow_core::schema::{Attribute, RecordSchema, RowKeyDescriptor};
//! use widerow_core::{Record, Registry, SchemaSync};
//! use widerow_storage::RocksTransport;
//!
//! let tmp = TempDir::new().unwrap();
//! let registry = Registry::default();
//! registry.add_cluster("local").unwrap();
//! registry
//!     .add_keyspace("local", "app", Arc::new(RocksTransport::open(tmp.path()).unwrap()))
//!     .unwrap();
//! let user = registry
//!     .register_record_type(
//!         RecordSchema::new("User")
//!             .row_key(RowKeyDescriptor::new("uuid"))
//!             .attribute("username", Attribute::text()),
//!     )
//!     .unwrap();
//! registry.sync_schema(SchemaSync::CreateMissing).unwrap();
//!
//! let mut dave = Record::with_key(Arc::clone(&user), "dave");
//! dave.set("username", "dave").unwrap();
//! dave.save().unwrap();
//! assert!(Record::load_key(user, "dave").unwrap().is_persisted());
//! ```

pub mod column_families;
pub mod config;
pub mod error;
pub mod keys;
pub mod rocksdb_transport;

// Re-exports for convenience
pub use config::RocksTransportConfig;
pub use error::{RocksResult, RocksTransportError};
pub use rocksdb_transport::{RocksTransport, StoredCell, CELL_FORMAT_VERSION};
