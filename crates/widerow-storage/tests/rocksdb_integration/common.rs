//! Common test utilities for integration tests.

use std::sync::Arc;

use tempfile::TempDir;
use widerow_core::schema::{Attribute, IndexDescriptor, RecordSchema, RowKeyDescriptor};
use widerow_core::transport::{Column, ColumnFamilyDef};
use widerow_core::types::STANDARD_COLUMN_TYPE;
use widerow_core::{Comparator, RecordBinding, Registry, SchemaSync, Transport};
use widerow_storage::RocksTransport;

/// Install a test log subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Setup a fresh RocksDB transport in a temporary directory
pub fn setup_db() -> (RocksTransport, TempDir) {
    init_tracing();
    let tmp = TempDir::new().expect("create temp dir");
    let transport = RocksTransport::open(tmp.path()).expect("open db");
    (transport, tmp)
}

pub fn family(name: &str, comparator: Comparator) -> ColumnFamilyDef {
    ColumnFamilyDef {
        keyspace: "ks".to_string(),
        name: name.to_string(),
        column_type: STANDARD_COLUMN_TYPE.to_string(),
        comparator,
        comment: None,
    }
}

/// Fresh transport with one family `cf` using `comparator`.
pub fn setup_family(comparator: Comparator) -> (RocksTransport, TempDir) {
    let (transport, tmp) = setup_db();
    transport
        .create_column_family(&family("cf", comparator))
        .expect("create family");
    (transport, tmp)
}

pub fn col(name: &[u8], value: &[u8]) -> Column {
    Column::new(name.to_vec(), value.to_vec())
}

pub fn utf8_names(columns: &[Column]) -> Vec<String> {
    columns
        .iter()
        .map(|c| String::from_utf8(c.name.clone()).expect("utf8 column name"))
        .collect()
}

/// Registry with one keyspace `app` on `transport`, a `User` type with an
/// `all` index and a `by_city` secondary index, schema synced.
pub fn user_registry(transport: Arc<RocksTransport>) -> (Registry, Arc<RecordBinding>) {
    let registry = Registry::default();
    registry.add_cluster("local").expect("cluster");
    registry.add_keyspace("local", "app", transport).expect("keyspace");
    let user = registry
        .register_record_type(
            RecordSchema::new("User")
                .row_key(RowKeyDescriptor::new("uuid").autogenerate())
                .attribute("username", Attribute::text())
                .attribute("city", Attribute::text().optional())
                .attribute("age", Attribute::integer().optional())
                .index("all", IndexDescriptor::all())
                .index("by_city", IndexDescriptor::secondary("city")),
        )
        .expect("register User");
    registry.sync_schema(SchemaSync::CreateMissing).expect("sync");
    (registry, user)
}
