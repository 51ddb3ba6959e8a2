//! The mapping layer running on RocksDB.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use widerow_core::schema::{Attribute, IndexDescriptor, RecordSchema, RowKeyDescriptor};
use widerow_core::transport::SlicePredicate;
use widerow_core::{
    load_multi, ConsistencyLevel, IndexRecord, LoadOptions, Record, RecordBinding, Registry, RowKey, SchemaSync,
    Transport, Value,
};
use widerow_storage::RocksTransport;

use super::common::{setup_db, user_registry, utf8_names};

fn member_registry(transport: Arc<RocksTransport>) -> (Registry, Arc<RecordBinding>) {
    let registry = Registry::default();
    registry.add_cluster("local").expect("cluster");
    registry.add_keyspace("local", "app", transport).expect("keyspace");
    let member = registry
        .register_record_type(
            RecordSchema::new("Member")
                .row_key(RowKeyDescriptor::new("handle"))
                .attribute("name", Attribute::text())
                .attribute("score", Attribute::integer().with_default(0))
                .index("follows", IndexDescriptor::manual("Member").unique()),
        )
        .expect("register Member");
    registry.sync_schema(SchemaSync::CreateMissing).expect("sync");
    (registry, member)
}

fn member(binding: &Arc<RecordBinding>, handle: &str, name: &str) -> Record {
    let mut record = Record::with_key(Arc::clone(binding), handle);
    record.set("name", name).expect("set name");
    record.save().expect("save");
    record
}

#[test]
fn test_update_writes_only_changed_columns() {
    println!("=== TEST: second save sends only the dirty column ===");
    let (db, _tmp) = setup_db();
    let transport = Arc::new(db);
    let (_registry, members) = member_registry(Arc::clone(&transport));

    let mut ann = member(&members, "ann", "Ann");
    let first = stored(&transport, "ann");
    println!("VERIFY: first save stored {:?}", utf8_names(&first));
    assert_eq!(utf8_names(&first), ["created_at", "last_modified", "name", "score"]);

    thread::sleep(Duration::from_millis(2));
    ann.set("score", 12).expect("set score");
    ann.save().expect("save");
    let second = stored(&transport, "ann");

    let timestamp_of = |cols: &[widerow_core::transport::Column], name: &str| {
        cols.iter()
            .find(|c| c.name == name.as_bytes())
            .map(|c| c.timestamp)
            .expect("column present")
    };
    assert_eq!(timestamp_of(&first, "name"), timestamp_of(&second, "name"));
    assert!(timestamp_of(&second, "score") > timestamp_of(&first, "score"));

    let loaded = Record::load_key(Arc::clone(&members), "ann").expect("load");
    assert_eq!(loaded.require("score").expect("score"), Value::from(12));
    assert_eq!(loaded, ann);
}

fn stored(transport: &RocksTransport, row: &str) -> Vec<widerow_core::transport::Column> {
    transport
        .multiget_columns("app", "Member", &[row.to_string()], &SlicePredicate::all(100), ConsistencyLevel::One)
        .expect("multiget")
        .into_iter()
        .next()
        .map(|s| s.columns)
        .unwrap_or_default()
}

#[test]
fn test_batch_load_follows_request_order() {
    let (db, _tmp) = setup_db();
    let (_registry, members) = member_registry(Arc::new(db));
    for (handle, name) in [("a", "Ann"), ("b", "Bob"), ("c", "Cat")] {
        member(&members, handle, name);
    }

    let keys: Vec<RowKey> = ["c", "zz", "a", "c"].iter().map(|k| k.to_string()).collect();
    let loaded = load_multi(&members, &keys, &LoadOptions::default()).expect("load_multi");
    let names: Vec<Value> = loaded.iter().map(|r| r.require("name").expect("name")).collect();
    assert_eq!(names, vec![Value::from("Cat"), Value::from("Ann"), Value::from("Cat")]);

    let unordered = load_multi(&members, &keys, &LoadOptions::unordered()).expect("load_multi");
    assert_eq!(unordered.len(), 2);
}

#[test]
fn test_unique_manual_index_on_disk() {
    let (db, _tmp) = setup_db();
    let transport = Arc::new(db);
    let (_registry, members) = member_registry(Arc::clone(&transport));
    let ann = member(&members, "ann", "Ann");
    let bob = member(&members, "bob", "Bob");
    let cat = member(&members, "cat", "Cat");

    let mut follows = ann.index("follows").expect("follows");
    assert!(follows.append(&bob).expect("append bob").is_some());
    assert!(follows.append(&cat).expect("append cat").is_some());
    follows.save().expect("save");

    let mut again = ann.index("follows").expect("follows");
    assert_eq!(again.append(&bob).expect("duplicate check"), None);
    again.save().expect("no-op save");

    let mut reloaded = ann.index("follows").expect("follows");
    reloaded.load().expect("load");
    assert_eq!(reloaded.target_keys().expect("keys"), vec!["bob".to_string(), "cat".to_string()]);
    let resolved = reloaded.resolve().expect("resolve");
    assert_eq!(resolved, vec![bob, cat]);
}

#[test]
fn test_secondary_index_and_default_key() {
    let (db, _tmp) = setup_db();
    let (_registry, user) = user_registry(Arc::new(db));
    let mut dave = Record::new(Arc::clone(&user));
    dave.update([("username", Value::from("dave")), ("city", Value::from("Rome"))])
        .expect("update");
    dave.save().expect("save");

    let all_type = Arc::clone(user.index("all").expect("all"));
    let mut all = IndexRecord::with_default_key(all_type).expect("default key");
    assert_eq!(all.row_key(), Some("!ALL!"));
    all.load().expect("load");
    let items = all.resolve_items().expect("items");
    assert_eq!(items.len(), 1);
    assert!(items[0].0.as_uuid().is_some());
    assert_eq!(items[0].1, dave);

    let rome = IndexRecord::load_with_key(Arc::clone(user.index("by_city").expect("by_city")), "Rome")
        .expect("load");
    assert_eq!(rome.references().expect("refs")[0].row_key, dave.row_key().expect("key"));
}
