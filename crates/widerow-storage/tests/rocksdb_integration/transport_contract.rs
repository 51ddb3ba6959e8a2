//! The `Transport` contract, checked against RocksDB.
//!
//! Mirrors the behavior of the in-memory transport: comparator-ordered
//! slices, bounded and reversed ranges, name lookups, row-key ordered
//! multiget, and schema introspection.

use widerow_core::transport::{SlicePredicate, SliceRange};
use widerow_core::types::time_uuid::TimeUuidGenerator;
use widerow_core::{Comparator, ConsistencyLevel, RowKey, Transport, TransportError};

use super::common::{col, family, setup_db, setup_family, utf8_names};

const ONE: ConsistencyLevel = ConsistencyLevel::One;

fn write_letters(t: &dyn Transport, row: &str, letters: &[&str]) {
    let cols: Vec<_> = letters.iter().map(|l| col(l.as_bytes(), b"v")).collect();
    t.batch_write("ks", "cf", row, &cols, ONE).expect("write");
}

fn range(start: &str, finish: &str, reverse: bool, count: usize) -> SlicePredicate {
    SlicePredicate::Range(SliceRange {
        start: start.as_bytes().to_vec(),
        finish: finish.as_bytes().to_vec(),
        reverse,
        count,
    })
}

fn fetch_names(t: &dyn Transport, row: &str, predicate: SlicePredicate) -> Vec<String> {
    let slices = t
        .multiget_columns("ks", "cf", &[row.to_string()], &predicate, ONE)
        .expect("multiget");
    slices.first().map(|s| utf8_names(&s.columns)).unwrap_or_default()
}

#[test]
fn test_forward_range_bounds_and_count() {
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "r", &["e", "a", "c", "b", "d"]);

    assert_eq!(fetch_names(&t, "r", SlicePredicate::all(100)), ["a", "b", "c", "d", "e"]);
    assert_eq!(fetch_names(&t, "r", range("b", "d", false, 100)), ["b", "c", "d"]);
    assert_eq!(fetch_names(&t, "r", range("b", "", false, 2)), ["b", "c"]);
    assert_eq!(fetch_names(&t, "r", range("", "bb", false, 100)), ["a", "b"]);
}

#[test]
fn test_reverse_range_stays_inside_row() {
    println!("=== TEST: reverse slice does not leak into the next row ===");
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "a", &["x", "y", "z"]);
    write_letters(&t, "b", &["p", "q"]);

    println!("TRIGGER: unbounded reverse slice of row 'a'");
    let names = fetch_names(&t, "a", range("", "", true, 100));
    println!("VERIFY: got {:?}", names);
    assert_eq!(names, ["z", "y", "x"]);

    assert_eq!(fetch_names(&t, "a", range("y", "", true, 100)), ["y", "x"]);
    assert_eq!(fetch_names(&t, "a", range("", "y", true, 1)), ["z"]);
    assert_eq!(fetch_names(&t, "b", SlicePredicate::all(100)), ["p", "q"]);
    assert_eq!(
        fetch_names(&t, "b", SlicePredicate::Range(SliceRange::all(1).reversed())),
        ["q"]
    );
}

#[test]
fn test_names_predicate_returns_present_columns_in_order() {
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "r", &["a", "b", "c"]);

    let predicate = SlicePredicate::Names(vec![b"c".to_vec(), b"missing".to_vec(), b"a".to_vec(), b"c".to_vec()]);
    assert_eq!(fetch_names(&t, "r", predicate), ["a", "c"]);
}

#[test]
fn test_time_uuid_columns_in_issue_order() {
    let (t, _tmp) = setup_family(Comparator::TimeUuid);
    let gen = TimeUuidGenerator::new();
    let keys: Vec<Vec<u8>> = (0..20).map(|_| gen.next().as_bytes().to_vec()).collect();

    // Write newest first, one column per batch.
    for (i, key) in keys.iter().enumerate().rev() {
        t.batch_write("ks", "cf", "idx", &[col(key, i.to_string().as_bytes())], ONE)
            .expect("write");
    }

    let slices = t
        .multiget_columns("ks", "cf", &["idx".to_string()], &SlicePredicate::all(100), ONE)
        .expect("multiget");
    let got: Vec<Vec<u8>> = slices[0].columns.iter().map(|c| c.name.clone()).collect();
    assert_eq!(got, keys);

    let newest = t
        .multiget_columns(
            "ks",
            "cf",
            &["idx".to_string()],
            &SlicePredicate::Range(SliceRange::all(3).reversed()),
            ONE,
        )
        .expect("multiget");
    let got: Vec<Vec<u8>> = newest[0].columns.iter().map(|c| c.name.clone()).collect();
    assert_eq!(got, keys.iter().rev().take(3).cloned().collect::<Vec<_>>());
}

#[test]
fn test_multiget_skips_missing_rows_and_dedupes() {
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "k3", &["a"]);
    write_letters(&t, "k1", &["a"]);

    let keys: Vec<RowKey> = ["k3", "k2", "k1", "k3"].iter().map(|k| k.to_string()).collect();
    let slices = t
        .multiget_columns("ks", "cf", &keys, &SlicePredicate::all(10), ONE)
        .expect("multiget");
    let rows: Vec<&str> = slices.iter().map(|s| s.row_key.as_str()).collect();
    assert_eq!(rows, ["k1", "k3"]);
}

#[test]
fn test_rows_with_shared_prefix_are_separate() {
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "user", &["a"]);
    write_letters(&t, "user1", &["b"]);
    assert_eq!(fetch_names(&t, "user", SlicePredicate::all(10)), ["a"]);
    assert_eq!(fetch_names(&t, "user1", SlicePredicate::all(10)), ["b"]);
}

#[test]
fn test_schema_introspection_and_conflicts() {
    let (t, _tmp) = setup_db();
    assert!(t.describe_keyspace("ks").expect("describe").column_families.is_empty());

    t.create_column_family(&family("b", Comparator::Utf8)).expect("create b");
    t.create_column_family(&family("a", Comparator::Long)).expect("create a");
    // Same definition twice is fine.
    t.create_column_family(&family("a", Comparator::Long)).expect("create a again");

    let names: Vec<String> = t
        .describe_keyspace("ks")
        .expect("describe")
        .column_families
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, ["a", "b"]);
    assert!(t.describe_keyspace("other").expect("describe").column_families.is_empty());

    let err = t.create_column_family(&family("a", Comparator::Utf8)).unwrap_err();
    println!("VERIFY: conflicting create rejected: {}", err);
    assert!(matches!(err, TransportError::InvalidRequest(_)));

    t.drop_column_family("ks", "a").expect("drop");
    assert!(t.describe_column_family("ks", "a").expect("describe").is_none());
    assert!(matches!(
        t.drop_column_family("ks", "a"),
        Err(TransportError::UnknownColumnFamily { .. })
    ));
    assert!(matches!(
        t.multiget_columns("ks", "a", &["r".to_string()], &SlicePredicate::all(1), ONE),
        Err(TransportError::UnknownColumnFamily { .. })
    ));
}

#[test]
fn test_dropped_family_comes_back_empty() {
    let (t, _tmp) = setup_family(Comparator::Utf8);
    write_letters(&t, "r", &["a"]);
    t.drop_column_family("ks", "cf").expect("drop");
    t.create_column_family(&family("cf", Comparator::Utf8)).expect("recreate");
    assert!(fetch_names(&t, "r", SlicePredicate::all(10)).is_empty());
}
