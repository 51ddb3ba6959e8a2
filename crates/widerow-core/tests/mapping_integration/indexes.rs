//! Automatic and manual index maintenance.

use std::sync::Arc;

use super::common::{create_user, setup, setup_with};
use widerow_core::{IndexRecord, MappingConfig, MappingError, Record, RecordRef, Value};

#[test]
fn test_all_index_lists_every_user() {
    let fx = setup();
    let names = ["ann", "bob", "cat"];
    let created: Vec<Record> = names.iter().map(|n| create_user(&fx, n, None)).collect();

    let all_type = Arc::clone(fx.user.index("all").expect("all index"));
    let all = IndexRecord::load_with_key(all_type, "!ALL!").expect("load all");
    assert_eq!(all.len(), 3);

    let resolved = all.resolve().expect("resolve");
    let got: Vec<Value> = resolved
        .iter()
        .map(|r| r.require("username").expect("username"))
        .collect();
    println!("VERIFY: all index resolves to {:?}", got);
    assert_eq!(got, names.iter().map(|n| Value::from(*n)).collect::<Vec<_>>());
    assert_eq!(resolved, created);
}

#[test]
fn test_secondary_index_groups_by_field() {
    let fx = setup();
    create_user(&fx, "ann", Some("Smith"));
    create_user(&fx, "bob", Some("Jones"));
    create_user(&fx, "cat", Some("Smith"));

    let by_lastname = Arc::clone(fx.user.index("by_lastname").expect("index"));
    let smiths = IndexRecord::load_with_key(Arc::clone(&by_lastname), "Smith").expect("load");
    let usernames: Vec<Value> = smiths
        .resolve()
        .expect("resolve")
        .iter()
        .map(|r| r.require("username").expect("username"))
        .collect();
    assert_eq!(usernames, vec![Value::from("ann"), Value::from("cat")]);

    let nobody = IndexRecord::load_with_key(by_lastname, "Brown").expect("load");
    assert!(nobody.is_empty());
    assert!(nobody.resolve().expect("resolve").is_empty());
}

#[test]
fn test_index_over_foreign_key() {
    let fx = setup();
    let dave = create_user(&fx, "dave", None);
    for title in ["one", "two"] {
        let mut post = Record::new(Arc::clone(&fx.post));
        post.set("title", title).expect("title");
        post.set("author", dave.as_reference().expect("ref")).expect("author");
        post.save().expect("save");
    }

    let by_author = Arc::clone(fx.post.index("by_author").expect("index"));
    let posts = IndexRecord::load_with_key(by_author, dave.row_key().expect("key")).expect("load");
    assert_eq!(posts.target(), "Post");
    let titles: Vec<Value> = posts
        .resolve()
        .expect("resolve")
        .iter()
        .map(|p| p.require("title").expect("title"))
        .collect();
    assert_eq!(titles, vec![Value::from("one"), Value::from("two")]);
}

#[test]
fn test_manual_index_through_record() {
    let fx = setup();
    let ann = create_user(&fx, "ann", None);
    let bob = create_user(&fx, "bob", None);
    let cat = create_user(&fx, "cat", None);

    let mut friends = ann.index("friends").expect("friends");
    friends.append(&cat).expect("append cat");
    friends.append(&bob).expect("append bob");
    friends.append(&cat).expect("non-unique index accepts repeats");
    friends.save().expect("save friends");

    let mut reloaded = ann.index("friends").expect("friends");
    reloaded.load().expect("load");
    let refs = reloaded.references().expect("references");
    assert_eq!(
        refs,
        vec![
            RecordRef::new("User", cat.row_key().expect("key")),
            RecordRef::new("User", bob.row_key().expect("key")),
            RecordRef::new("User", cat.row_key().expect("key")),
        ]
    );
    let resolved = reloaded.resolve().expect("resolve");
    assert_eq!(resolved, vec![cat.clone(), bob, cat]);

    let items = reloaded.resolve_items().expect("items");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|(k, _)| matches!(k, Value::Uuid(_))));
}

#[test]
fn test_unique_index_rejects_stored_duplicates() {
    let fx = setup();
    let ann = create_user(&fx, "ann", None);
    let bob = create_user(&fx, "bob", None);

    let mut blocked = ann.index("blocked").expect("blocked");
    assert!(blocked.append(&bob).expect("first").is_some());
    blocked.save().expect("save");

    let mut again = ann.index("blocked").expect("blocked");
    assert_eq!(again.append(&bob).expect("duplicate"), None);
    again.save().expect("no-op save");
    assert_eq!(fx.store.column_count("app", "Auto_User_blocked", ann.row_key().expect("key")), 1);
}

#[test]
fn test_unique_check_hits_column_ceiling() {
    let config = MappingConfig {
        default_column_count: 2,
        uniqueness_ceiling: 3,
        ..MappingConfig::default()
    };
    let fx = setup_with(config);
    let ann = create_user(&fx, "ann", None);

    let mut blocked = ann.index("blocked").expect("blocked");
    for key in ["u1", "u2", "u3"] {
        blocked.append_key(key).expect("append");
    }
    blocked.save().expect("save");

    // A row holding exactly the ceiling is still checked in full.
    let mut at_ceiling = ann.index("blocked").expect("blocked");
    assert!(at_ceiling.append_key("u4").expect("at ceiling").is_some());
    at_ceiling.save().expect("save");

    let mut more = ann.index("blocked").expect("blocked");
    let err = more.append_key("u5").expect_err("ceiling exceeded");
    println!("VERIFY: {}", err);
    assert!(matches!(err, MappingError::ColumnCeilingExceeded { count: 4, ceiling: 3, .. }));

    // Plain loads stop at the default column count.
    let mut partial = ann.index("blocked").expect("blocked");
    partial.load().expect("load");
    assert_eq!(partial.len(), 2);
}

#[test]
fn test_auto_index_not_reopened_by_resave() {
    let fx = setup();
    let mut dave = create_user(&fx, "dave", None);
    dave.set("email", "d@example.com").expect("set");
    dave.save().expect("save");

    let all_type = Arc::clone(fx.user.index("all").expect("all"));
    let all = IndexRecord::load_with_key(all_type, "!ALL!").expect("load");
    assert_eq!(all.len(), 1);
}
