//! Batch loading through a transport that scrambles row order.

use std::sync::Arc;

use super::common::{create_user, setup};
use widerow_core::transport::{SliceRange, SlicePredicate};
use widerow_core::{load_multi, ConsistencyLevel, LoadOptions, MappingError, Record, RowKey};

fn keys_of(records: &[Record]) -> Vec<RowKey> {
    records
        .iter()
        .map(|r| r.row_key().expect("key").to_string())
        .collect()
}

#[test]
fn test_ordered_load_restores_request_order() {
    let fx = setup();
    let users: Vec<Record> = ["ann", "bob", "cat", "dan"]
        .iter()
        .map(|n| create_user(&fx, n, None))
        .collect();
    let keys = keys_of(&users);
    let request: Vec<RowKey> = vec![keys[2].clone(), keys[0].clone(), keys[3].clone(), keys[0].clone()];

    let loaded = load_multi(&fx.user, &request, &LoadOptions::default()).expect("load");
    assert_eq!(keys_of(&loaded), request);
    assert!(loaded.iter().all(|r| r.is_persisted() && !r.is_dirty()));
}

#[test]
fn test_unordered_load_keeps_transport_order() {
    let fx = setup();
    let users: Vec<Record> = ["ann", "bob"].iter().map(|n| create_user(&fx, n, None)).collect();
    let mut keys = keys_of(&users);

    let loaded = load_multi(&fx.user, &keys, &LoadOptions::unordered()).expect("load");
    let mut got = keys_of(&loaded);
    got.sort();
    keys.sort();
    assert_eq!(got, keys);
}

#[test]
fn test_missing_rows_are_dropped() {
    let fx = setup();
    let ann = create_user(&fx, "ann", None);
    let request = vec!["ghost".to_string(), ann.row_key().expect("key").to_string()];
    let loaded = load_multi(&fx.user, &request, &LoadOptions::default()).expect("load");
    assert_eq!(loaded, vec![ann]);
}

#[test]
fn test_empty_requests_rejected() {
    let fx = setup();
    let err = load_multi(&fx.user, &[], &LoadOptions::default()).expect_err("empty");
    assert!(matches!(err, MappingError::InvalidArgument(_)));
}

#[test]
fn test_reverse_slice_reads_newest_columns() {
    let fx = setup();
    let ann = create_user(&fx, "ann", None);
    let mut friends = ann.index("friends").expect("friends");
    for key in ["f1", "f2", "f3"] {
        friends.append_key(key).expect("append");
    }
    friends.save().expect("save");

    let options = LoadOptions::default()
        .with_predicate(SlicePredicate::Range(SliceRange::all(2).reversed()))
        .with_consistency(ConsistencyLevel::Quorum);
    let mut newest = ann.index("friends").expect("friends");
    newest.load_with(&options).expect("load");
    assert_eq!(newest.target_keys().expect("keys"), vec!["f3".to_string(), "f2".to_string()]);

    let binding = Arc::clone(newest.binding());
    let loaded = load_multi(&binding, &[ann.row_key().expect("key").to_string()], &options).expect("load");
    assert_eq!(loaded[0].len(), 2);
}
