//! Server-list failover.
//!
//! [`FailoverTransport`] presents a list of servers as a single
//! [`Transport`]. Each call goes to the connection currently held; on a
//! connectivity failure the connection is dropped and the next server in the
//! list is tried, until one answers, the list is exhausted
//! (`NoServerAvailable`), or the configured timeout elapses (`Timeout`).
//!
//! The timeout is checked before each attempt. A call already in flight is
//! bounded only by the underlying transport. With no timeout configured the
//! loop ends solely on list exhaustion.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    Column, ColumnFamilyDef, ConsistencyLevel, KeySlice, KeyspaceDescription, SlicePredicate, Transport,
    TransportError, TransportResult,
};
use crate::config::ConnectionConfig;
use crate::error::MappingResult;
use crate::types::RowKey;

/// Opens a transport to one server.
pub trait Connector: Send + Sync {
    /// Connect to `server` (a `host:port` string from the config).
    ///
    /// # Errors
    ///
    /// Should return `TransportError::Connection` when the server cannot be
    /// reached so that the next server is tried.
    fn connect(&self, server: &str) -> TransportResult<Arc<dyn Transport>>;
}

impl<F> Connector for F
where
    F: Fn(&str) -> TransportResult<Arc<dyn Transport>> + Send + Sync,
{
    fn connect(&self, server: &str) -> TransportResult<Arc<dyn Transport>> {
        self(server)
    }
}

struct Active {
    server: String,
    transport: Arc<dyn Transport>,
}

/// A [`Transport`] that fails over across a configured server list.
pub struct FailoverTransport {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    active: Mutex<Option<Active>>,
    next_start: AtomicUsize,
}

impl FailoverTransport {
    /// Create a failover transport. No connection is opened until the first
    /// call.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::Configuration` if the config is invalid.
    pub fn new(config: ConnectionConfig, connector: impl Connector + 'static) -> MappingResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Box::new(connector),
            active: Mutex::new(None),
            next_start: AtomicUsize::new(0),
        })
    }

    /// Server of the connection currently held, if any.
    pub fn current_server(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.server.clone())
    }

    /// Drop the held connection; the next call reconnects.
    pub fn disconnect(&self) {
        if let Some(active) = self.active.lock().take() {
            debug!(server = %active.server, "dropped connection");
        }
    }

    fn ordered_servers(&self) -> Vec<&str> {
        let servers = &self.config.servers;
        let start = if self.config.round_robin {
            self.next_start.fetch_add(1, Ordering::Relaxed) % servers.len()
        } else {
            0
        };
        servers[start..]
            .iter()
            .chain(servers[..start].iter())
            .map(String::as_str)
            .collect()
    }

    fn execute<T>(&self, op: impl Fn(&dyn Transport) -> TransportResult<T>) -> TransportResult<T> {
        let started = Instant::now();
        let deadline = self.config.timeout_ms.map(Duration::from_millis);
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error = String::new();

        let held = self.active.lock().as_ref().map(|a| (a.server.clone(), Arc::clone(&a.transport)));
        if let Some((server, transport)) = held {
            match op(transport.as_ref()) {
                Err(e) if e.is_retryable() => {
                    warn!(server = %server, error = %e, "connection failed, failing over");
                    self.disconnect();
                    attempted.push(server);
                    last_error = e.to_string();
                }
                result => return result,
            }
        }

        for server in self.ordered_servers() {
            if attempted.iter().any(|s| s == server) {
                continue;
            }
            if let Some(limit) = deadline {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(TransportError::Timeout {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
            attempted.push(server.to_string());

            let transport = match self.connector.connect(server) {
                Ok(t) => t,
                Err(e) => {
                    warn!(server, error = %e, "connect failed");
                    last_error = e.to_string();
                    continue;
                }
            };
            match op(transport.as_ref()) {
                Err(e) if e.is_retryable() => {
                    warn!(server, error = %e, "request failed, trying next server");
                    last_error = e.to_string();
                }
                result => {
                    info!(server, "connected");
                    *self.active.lock() = Some(Active {
                        server: server.to_string(),
                        transport,
                    });
                    return result;
                }
            }
        }

        Err(TransportError::NoServerAvailable { attempted, last_error })
    }
}

impl fmt::Debug for FailoverTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverTransport")
            .field("servers", &self.config.servers)
            .field("round_robin", &self.config.round_robin)
            .field("timeout_ms", &self.config.timeout_ms)
            .field("current", &self.current_server())
            .finish()
    }
}

impl Transport for FailoverTransport {
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> TransportResult<()> {
        self.execute(|t| t.batch_write(keyspace, column_family, row_key, columns, consistency))
    }

    fn multiget_columns(
        &self,
        keyspace: &str,
        column_family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> TransportResult<Vec<KeySlice>> {
        self.execute(|t| t.multiget_columns(keyspace, column_family, row_keys, predicate, consistency))
    }

    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription> {
        self.execute(|t| t.describe_keyspace(keyspace))
    }

    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>> {
        self.execute(|t| t.describe_column_family(keyspace, name))
    }

    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()> {
        self.execute(|t| t.create_column_family(def))
    }

    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()> {
        self.execute(|t| t.drop_column_family(keyspace, name))
    }
}

