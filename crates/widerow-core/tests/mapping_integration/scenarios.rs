//! End-to-end scenarios.

use std::sync::Arc;

use super::common::{column_names, setup};
use widerow_core::{IndexRecord, Record, Value};

#[test]
fn test_dave_scenario() {
    let fx = setup();

    println!("=== DAVE SCENARIO ===");
    let mut dave = Record::new(Arc::clone(&fx.user));
    dave.set("username", "dave").expect("username");
    dave.set("lastname", "Smith").expect("lastname");
    dave.save().expect("first save");
    let key = dave.row_key().expect("generated key").to_string();
    println!("TRIGGER: saved dave as {}", key);

    // Primary row plus both auto-saved indexes.
    assert_eq!(fx.store.writes_to("User").len(), 1);
    let all_writes = fx.store.writes_to("Auto_User_all");
    assert_eq!(all_writes.len(), 1);
    assert_eq!(all_writes[0].row_key, "!ALL!");
    assert_eq!(all_writes[0].columns[0].value, key.as_bytes().to_vec());
    assert_eq!(fx.store.writes_to("Auto_User_by_lastname")[0].row_key, "Smith");

    // The all index resolves back to dave.
    let all_type = Arc::clone(fx.user.index("all").expect("all"));
    let all = IndexRecord::load_with_key(all_type, "!ALL!").expect("load all");
    let everyone = all.resolve().expect("resolve");
    assert_eq!(everyone, vec![dave.clone()]);
    assert_eq!(everyone[0].require("username").expect("username"), Value::from("dave"));

    // A second save writes only what changed.
    fx.store.clear_write_log();
    dave.set("email", "dave@example.com").expect("email");
    dave.save().expect("second save");
    let writes = fx.store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].column_family, "User");
    assert_eq!(column_names(&writes[0].columns), vec!["email", "last_modified"]);
}

#[test]
fn test_registry_lookup_by_name() {
    let fx = setup();
    let mut record = fx.registry.new_record("User").expect("new record");
    record.set("username", "eve").expect("set");
    record.save().expect("save");

    let reference = record.as_reference().expect("reference");
    let found = fx.registry.resolve(&reference).expect("resolve").expect("exists");
    assert_eq!(found, record);
    assert!(fx.registry.record_type("Auto_User_friends").is_ok());
}
