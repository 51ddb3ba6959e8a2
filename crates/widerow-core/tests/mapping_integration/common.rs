//! Common test utilities for integration tests.
//!
//! Provides a registry wired to an in-memory store plus the `User` and
//! `Post` types most suites use.

use std::sync::Arc;

use widerow_core::schema::{Attribute, IndexDescriptor, RecordSchema, RowKeyDescriptor};
use widerow_core::transport::{
    Column, ColumnFamilyDef, KeySlice, KeyspaceDescription, SlicePredicate, TransportResult,
};
use widerow_core::{
    ConsistencyLevel, MappingConfig, MemoryTransport, RecordBinding, Registry, RowKey, SchemaSync, Transport,
};

/// Memory store that returns batch reads in reverse order.
#[derive(Debug)]
pub struct ReversingTransport {
    pub inner: Arc<MemoryTransport>,
}

impl Transport for ReversingTransport {
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> TransportResult<()> {
        self.inner
            .batch_write(keyspace, column_family, row_key, columns, consistency)
    }

    fn multiget_columns(
        &self,
        keyspace: &str,
        column_family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> TransportResult<Vec<KeySlice>> {
        let mut slices = self
            .inner
            .multiget_columns(keyspace, column_family, row_keys, predicate, consistency)?;
        slices.reverse();
        Ok(slices)
    }

    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription> {
        self.inner.describe_keyspace(keyspace)
    }

    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>> {
        self.inner.describe_column_family(keyspace, name)
    }

    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()> {
        self.inner.create_column_family(def)
    }

    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()> {
        self.inner.drop_column_family(keyspace, name)
    }
}

pub struct Fixture {
    pub registry: Registry,
    pub store: Arc<MemoryTransport>,
    pub user: Arc<RecordBinding>,
    pub post: Arc<RecordBinding>,
}

pub fn user_schema() -> RecordSchema {
    RecordSchema::new("User")
        .row_key(RowKeyDescriptor::new("uuid").autogenerate())
        .attribute("username", Attribute::text())
        .attribute("lastname", Attribute::text().optional())
        .attribute("email", Attribute::text().optional())
        .index("all", IndexDescriptor::all())
        .index("by_lastname", IndexDescriptor::secondary("lastname"))
        .index("friends", IndexDescriptor::manual("User"))
        .index("blocked", IndexDescriptor::manual("User").unique())
}

pub fn post_schema() -> RecordSchema {
    RecordSchema::new("Post")
        .row_key(RowKeyDescriptor::new("id").autogenerate())
        .attribute("title", Attribute::text())
        .attribute("author", Attribute::foreign_key("User"))
        .index("by_author", IndexDescriptor::secondary("author"))
}

/// Registry over a fresh reversing memory store with `User` and `Post`
/// registered and their column families created.
pub fn setup() -> Fixture {
    setup_with(MappingConfig::default())
}

/// Install a test log subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn setup_with(config: MappingConfig) -> Fixture {
    init_tracing();
    let store = Arc::new(MemoryTransport::new());
    let registry = Registry::new(config).expect("valid config");
    registry.add_cluster("main").expect("add cluster");
    registry
        .add_keyspace(
            "main",
            "app",
            Arc::new(ReversingTransport {
                inner: Arc::clone(&store),
            }),
        )
        .expect("add keyspace");
    let user = registry.register_record_type(user_schema()).expect("register User");
    let post = registry.register_record_type(post_schema()).expect("register Post");
    let report = registry
        .sync_schema(SchemaSync::CreateMissing)
        .expect("sync schema");
    assert!(report.is_consistent(), "schema not consistent: {:?}", report);
    Fixture {
        registry,
        store,
        user,
        post,
    }
}

/// Save a user with the given username (and lastname, when given).
pub fn create_user(fx: &Fixture, username: &str, lastname: Option<&str>) -> widerow_core::Record {
    let mut user = widerow_core::Record::new(Arc::clone(&fx.user));
    user.set("username", username).expect("set username");
    if let Some(lastname) = lastname {
        user.set("lastname", lastname).expect("set lastname");
    }
    user.save().expect("save user");
    user
}

pub fn column_names(columns: &[Column]) -> Vec<String> {
    columns
        .iter()
        .map(|c| String::from_utf8_lossy(&c.name).into_owned())
        .collect()
}
