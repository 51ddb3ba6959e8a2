//! Configuration files driving a registry.

use std::io::Write;

use tempfile::NamedTempFile;
use widerow_core::schema::{Attribute, RecordSchema, RowKeyDescriptor};
use widerow_core::{ConsistencyLevel, MemoryTransport, Record, Registry, SchemaSync, WiderowConfig};

#[test]
fn test_config_file_drives_registry() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
[mapping]
default_column_count = 50
uniqueness_ceiling = 500
read_consistency = "quorum"
write_consistency = "all"

[connection]
servers = ["db1:9160", "db2:9160"]
timeout_ms = 250
"#
    )
    .expect("write config");

    let config = WiderowConfig::from_file(file.path()).expect("load config");
    assert_eq!(config.connection.servers.len(), 2);
    assert_eq!(config.connection.timeout_ms, Some(250));

    let registry = Registry::new(config.mapping).expect("registry");
    registry.add_cluster("main").expect("cluster");
    let store = std::sync::Arc::new(MemoryTransport::new());
    registry.add_keyspace("main", "app", store.clone()).expect("keyspace");
    let note = registry
        .register_record_type(
            RecordSchema::new("Note")
                .row_key(RowKeyDescriptor::new("key"))
                .attribute("body", Attribute::text()),
        )
        .expect("register");
    registry.sync_schema(SchemaSync::CreateMissing).expect("sync");

    assert_eq!(note.read_consistency(), ConsistencyLevel::Quorum);
    assert_eq!(note.write_consistency(), ConsistencyLevel::All);

    let mut record = Record::with_key(note, "n1");
    record.set("body", "hi").expect("set");
    record.save().expect("save");
    assert_eq!(store.writes()[0].consistency, ConsistencyLevel::All);
}

#[test]
fn test_schema_level_consistency_overrides_config() {
    let registry = Registry::default();
    registry.add_cluster("main").expect("cluster");
    registry
        .add_keyspace("main", "app", std::sync::Arc::new(MemoryTransport::new()))
        .expect("keyspace");
    let note = registry
        .register_record_type(
            RecordSchema::new("Note")
                .row_key(RowKeyDescriptor::new("key"))
                .attribute("body", Attribute::text())
                .write_consistency(ConsistencyLevel::Quorum),
        )
        .expect("register");
    assert_eq!(note.write_consistency(), ConsistencyLevel::Quorum);
    assert_eq!(note.read_consistency(), ConsistencyLevel::One);
}

#[test]
fn test_invalid_file_fails_validation() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "[mapping]\ndefault_column_count = 0").expect("write");
    let config = WiderowConfig::from_file(file.path()).expect("parses");
    let err = config.validate().expect_err("zero column count");
    assert!(err.to_string().contains("[mapping]"));
}
