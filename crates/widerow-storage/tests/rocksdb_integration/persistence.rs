//! What survives closing and reopening the database.

use std::sync::Arc;

use tempfile::TempDir;
use widerow_core::transport::SlicePredicate;
use widerow_core::{Comparator, ConsistencyLevel, IndexRecord, Record, Transport, Value};
use widerow_storage::{RocksTransport, RocksTransportConfig, RocksTransportError};

use super::common::{col, family, user_registry, utf8_names};

#[test]
fn test_families_and_rows_survive_reopen() {
    println!("=== TEST: reopen keeps definitions and cells ===");
    let tmp = TempDir::new().expect("create temp dir");
    {
        let t = RocksTransport::open(tmp.path()).expect("open");
        t.create_column_family(&family("counters", Comparator::Long)).expect("create");
        let cols = [col(&10i64.to_be_bytes(), b"ten"), col(&(-2i64).to_be_bytes(), b"minus two")];
        t.batch_write("ks", "counters", "r", &cols, ConsistencyLevel::One).expect("write");
    }

    println!("TRIGGER: reopen");
    let t = RocksTransport::open(tmp.path()).expect("reopen");
    t.health_check().expect("healthy");
    let def = t.describe_column_family("ks", "counters").expect("describe").expect("defined");
    assert_eq!(def.comparator, Comparator::Long);

    let slices = t
        .multiget_columns("ks", "counters", &["r".to_string()], &SlicePredicate::all(10), ConsistencyLevel::One)
        .expect("multiget");
    let values: Vec<Vec<u8>> = slices[0].columns.iter().map(|c| c.value.clone()).collect();
    println!("VERIFY: values after reopen {:?}", values);
    assert_eq!(values, vec![b"minus two".to_vec(), b"ten".to_vec()]);
}

#[test]
fn test_dropped_family_stays_dropped() {
    let tmp = TempDir::new().expect("create temp dir");
    {
        let t = RocksTransport::open(tmp.path()).expect("open");
        t.create_column_family(&family("keep", Comparator::Utf8)).expect("create");
        t.create_column_family(&family("gone", Comparator::Utf8)).expect("create");
        t.drop_column_family("ks", "gone").expect("drop");
    }
    let t = RocksTransport::open(tmp.path()).expect("reopen");
    let names: Vec<String> = t
        .describe_keyspace("ks")
        .expect("describe")
        .column_families
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, ["keep"]);
}

#[test]
fn test_flushed_writes_survive_without_wal() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = RocksTransportConfig {
        enable_wal: false,
        block_cache_size: 8 * 1024 * 1024,
        ..RocksTransportConfig::default()
    };
    {
        let t = RocksTransport::open_with_config(tmp.path(), config.clone()).expect("open");
        t.create_column_family(&family("cf", Comparator::Utf8)).expect("create");
        t.batch_write("ks", "cf", "r", &[col(b"a", b"1"), col(b"b", b"2")], ConsistencyLevel::One)
            .expect("write");
        t.flush_all().expect("flush");
    }
    let t = RocksTransport::open_with_config(tmp.path(), config).expect("reopen");
    let slices = t
        .multiget_columns("ks", "cf", &["r".to_string()], &SlicePredicate::all(10), ConsistencyLevel::One)
        .expect("multiget");
    assert_eq!(utf8_names(&slices[0].columns), ["a", "b"]);
}

#[test]
fn test_open_errors() {
    let tmp = TempDir::new().expect("create temp dir");
    let missing = tmp.path().join("does-not-exist");
    let config = RocksTransportConfig {
        create_if_missing: false,
        ..RocksTransportConfig::default()
    };
    let err = RocksTransport::open_with_config(&missing, config).unwrap_err();
    println!("VERIFY: {}", err);
    assert!(matches!(err, RocksTransportError::OpenFailed { .. }));
    assert!(err.to_string().contains("does-not-exist"));

    let invalid = RocksTransportConfig {
        block_cache_size: 0,
        ..RocksTransportConfig::default()
    };
    assert!(matches!(
        RocksTransport::open_with_config(tmp.path(), invalid),
        Err(RocksTransportError::InvalidConfig(_))
    ));
}

#[test]
fn test_records_and_indexes_survive_reopen() {
    println!("=== TEST: mapped records reload from a reopened store ===");
    let tmp = TempDir::new().expect("create temp dir");
    let mut keys = Vec::new();
    {
        let transport = Arc::new(RocksTransport::open(tmp.path()).expect("open"));
        let (_registry, user) = user_registry(transport);
        for (name, city) in [("ann", "Oslo"), ("bob", "Lima"), ("cat", "Oslo")] {
            let mut record = Record::new(Arc::clone(&user));
            record.set("username", name).expect("set");
            record.set("city", city).expect("set");
            record.save().expect("save");
            keys.push(record.row_key().expect("row key").to_string());
        }
    }

    println!("TRIGGER: reopen and rebuild the registry");
    let transport = Arc::new(RocksTransport::open(tmp.path()).expect("reopen"));
    let (_registry, user) = user_registry(transport);

    let ann = Record::load_key(Arc::clone(&user), keys[0].as_str()).expect("load");
    assert_eq!(ann.require("username").expect("username"), Value::from("ann"));
    assert!(!ann.is_dirty());

    let all = IndexRecord::load_with_key(Arc::clone(user.index("all").expect("all")), "!ALL!").expect("load all");
    let names: Vec<Value> = all
        .resolve()
        .expect("resolve")
        .iter()
        .map(|r| r.require("username").expect("username"))
        .collect();
    println!("VERIFY: all index after reopen {:?}", names);
    assert_eq!(names, vec![Value::from("ann"), Value::from("bob"), Value::from("cat")]);

    let oslo = IndexRecord::load_with_key(Arc::clone(user.index("by_city").expect("by_city")), "Oslo")
        .expect("load by_city");
    assert_eq!(oslo.target_keys().expect("keys"), vec![keys[0].clone(), keys[2].clone()]);
}
