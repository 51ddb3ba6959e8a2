//! Server-list failover in front of the memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use widerow_core::schema::{Attribute, RecordSchema, RowKeyDescriptor};
use widerow_core::transport::{Column, ColumnFamilyDef, KeySlice, KeyspaceDescription, SlicePredicate};
use widerow_core::{
    ConnectionConfig, ConsistencyLevel, FailoverTransport, MemoryTransport, Record, Registry, RowKey, SchemaSync,
    Transport, TransportError, TransportResult,
};

/// Server whose requests fail with a connection error while `down` is set.
#[derive(Debug)]
struct Server {
    name: String,
    store: Arc<MemoryTransport>,
    down: Mutex<bool>,
}

impl Server {
    fn check(&self) -> TransportResult<()> {
        if *self.down.lock() {
            return Err(TransportError::Connection {
                server: self.name.clone(),
                message: "connection reset".into(),
            });
        }
        Ok(())
    }
}

impl Transport for Server {
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> TransportResult<()> {
        self.check()?;
        self.store
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
        self.check()?;
        self.store
            .multiget_columns(keyspace, column_family, row_keys, predicate, consistency)
    }

    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription> {
        self.check()?;
        self.store.describe_keyspace(keyspace)
    }

    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>> {
        self.check()?;
        self.store.describe_column_family(keyspace, name)
    }

    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()> {
        self.check()?;
        self.store.create_column_family(def)
    }

    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()> {
        self.check()?;
        self.store.drop_column_family(keyspace, name)
    }
}

/// Servers sharing one store. Hosts not in the list refuse connections.
struct Cluster {
    servers: Vec<Arc<Server>>,
    connects: Arc<AtomicUsize>,
}

fn cluster(names: &[&str]) -> Cluster {
    let store = Arc::new(MemoryTransport::new());
    let servers = names
        .iter()
        .map(|n| {
            Arc::new(Server {
                name: n.to_string(),
                store: Arc::clone(&store),
                down: Mutex::new(false),
            })
        })
        .collect();
    Cluster {
        servers,
        connects: Arc::new(AtomicUsize::new(0)),
    }
}

fn failover(cluster: &Cluster, config: ConnectionConfig) -> FailoverTransport {
    let servers = cluster.servers.clone();
    let connects = Arc::clone(&cluster.connects);
    FailoverTransport::new(config, move |name: &str| -> TransportResult<Arc<dyn Transport>> {
        connects.fetch_add(1, Ordering::SeqCst);
        servers
            .iter()
            .find(|s| s.name == name)
            .map(|s| Arc::clone(s) as Arc<dyn Transport>)
            .ok_or_else(|| TransportError::Connection {
                server: name.to_string(),
                message: "unknown host".into(),
            })
    })
    .expect("valid config")
}

fn no_round_robin(servers: &[&str]) -> ConnectionConfig {
    ConnectionConfig {
        round_robin: false,
        ..ConnectionConfig::with_servers(servers.iter().copied())
    }
}

#[test]
fn test_fails_over_to_next_server() {
    let cluster = cluster(&["a:9160", "b:9160"]);
    let transport = failover(&cluster, no_round_robin(&["a:9160", "b:9160"]));

    transport.describe_keyspace("app").expect("first call");
    assert_eq!(transport.current_server().as_deref(), Some("a:9160"));

    *cluster.servers[0].down.lock() = true;
    transport.describe_keyspace("app").expect("after failover");
    assert_eq!(transport.current_server().as_deref(), Some("b:9160"));
    assert_eq!(cluster.connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unreachable_hosts_are_skipped() {
    let cluster = cluster(&["b:9160"]);
    let transport = failover(&cluster, no_round_robin(&["missing:9160", "b:9160"]));
    transport.describe_keyspace("app").expect("second host answers");
    assert_eq!(transport.current_server().as_deref(), Some("b:9160"));
}

#[test]
fn test_exhaustion_reports_every_attempt() {
    let cluster = cluster(&["a:9160", "b:9160"]);
    for server in &cluster.servers {
        *server.down.lock() = true;
    }
    let transport = failover(&cluster, no_round_robin(&["a:9160", "b:9160"]));
    match transport.describe_keyspace("app") {
        Err(TransportError::NoServerAvailable { attempted, last_error }) => {
            assert_eq!(attempted, vec!["a:9160".to_string(), "b:9160".to_string()]);
            assert!(last_error.contains("connection reset"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(transport.current_server().is_none());
}

#[test]
fn test_non_connection_errors_are_not_retried() {
    let cluster = cluster(&["a:9160", "b:9160"]);
    let transport = failover(&cluster, no_round_robin(&["a:9160", "b:9160"]));
    let err = transport
        .batch_write("app", "Nope", "k", &[Column::new(b"c".to_vec(), b"v".to_vec())], ConsistencyLevel::One)
        .expect_err("unknown family");
    assert!(matches!(err, TransportError::UnknownColumnFamily { .. }));
    assert_eq!(cluster.connects.load(Ordering::SeqCst), 1);
}

#[test]
fn test_deadline_checked_before_each_attempt() {
    let config = ConnectionConfig {
        timeout_ms: Some(1),
        ..no_round_robin(&["slow:9160", "b:9160"])
    };
    let transport = FailoverTransport::new(config, |name: &str| -> TransportResult<Arc<dyn Transport>> {
        std::thread::sleep(std::time::Duration::from_millis(5));
        Err(TransportError::Connection {
            server: name.to_string(),
            message: "connect timed out".into(),
        })
    })
    .expect("valid config");

    let err = transport.describe_keyspace("app").expect_err("deadline passed");
    assert!(matches!(err, TransportError::Timeout { .. }), "got {err:?}");
}

#[test]
fn test_round_robin_rotates_start() {
    let cluster = cluster(&["a:9160", "b:9160"]);
    let transport = failover(&cluster, ConnectionConfig::with_servers(["a:9160", "b:9160"]));
    transport.describe_keyspace("app").expect("first");
    let first = transport.current_server();
    transport.disconnect();
    transport.describe_keyspace("app").expect("second");
    assert_ne!(transport.current_server(), first);
}

#[test]
fn test_records_survive_failover() {
    let cluster = cluster(&["a:9160", "b:9160"]);
    let transport = Arc::new(failover(&cluster, no_round_robin(&["a:9160", "b:9160"])));

    let registry = Registry::default();
    registry.add_cluster("main").expect("cluster");
    registry.add_keyspace("main", "app", transport.clone()).expect("keyspace");
    let note = registry
        .register_record_type(
            RecordSchema::new("Note")
                .row_key(RowKeyDescriptor::new("key"))
                .attribute("body", Attribute::text()),
        )
        .expect("register");
    registry.sync_schema(SchemaSync::CreateMissing).expect("sync");

    let mut record = Record::with_key(Arc::clone(&note), "n1");
    record.set("body", "hello").expect("set");
    record.save().expect("save on a");

    *cluster.servers[0].down.lock() = true;
    let loaded = Record::load_key(note, "n1").expect("load from b");
    assert_eq!(loaded.require("body").expect("body").as_str(), Some("hello"));
    assert_eq!(transport.current_server().as_deref(), Some("b:9160"));
}
