//! RocksDB-backed [`Transport`].
//!
//! One RocksDB column family per store column family, named
//! `keyspace.family`. Family definitions are kept in the `__schema` family
//! so the comparator of every family survives a restart.
//!
//! Cells are bincode [`StoredCell`] envelopes. Concurrent writes to the same
//! column resolve last-write-wins by the column timestamp, as in the
//! in-memory transport; an older write arriving late is dropped.
//!
//! # Thread Safety
//!
//! Reads go straight to RocksDB. Writes and schema changes take a
//! transport-wide lock so the timestamp check and the write are atomic.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rocksdb::{
    BoundColumnFamily, Cache, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use widerow_core::transport::{Column, ColumnFamilyDef, KeySlice, KeyspaceDescription, SlicePredicate, SliceRange};
use widerow_core::{Comparator, ConsistencyLevel, RowKey, Transport, TransportResult};

use crate::column_families::{
    data_cf_name, data_cf_options, decode_family_def, encode_family_def, get_cf_descriptors, is_data_cf, CF_SCHEMA,
};
use crate::config::RocksTransportConfig;
use crate::error::{RocksResult, RocksTransportError};
use crate::keys::{decode_column, encode_column, prefix_successor, row_prefix};

type Db = DBWithThreadMode<MultiThreaded>;

/// Version of the [`StoredCell`] layout.
pub const CELL_FORMAT_VERSION: u8 = 1;

/// Value stored under each cell key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCell {
    pub version: u8,
    pub timestamp: i64,
    pub value: Vec<u8>,
}

impl StoredCell {
    fn encode(column: &Column) -> RocksResult<Vec<u8>> {
        Ok(bincode::serialize(&StoredCell {
            version: CELL_FORMAT_VERSION,
            timestamp: column.timestamp,
            value: column.value.clone(),
        })?)
    }

    fn decode(bytes: &[u8]) -> RocksResult<Self> {
        let cell: StoredCell = bincode::deserialize(bytes)?;
        if cell.version != CELL_FORMAT_VERSION {
            return Err(RocksTransportError::UnsupportedFormat {
                found: cell.version,
                expected: CELL_FORMAT_VERSION,
            });
        }
        Ok(cell)
    }
}

/// Persistent [`Transport`] on a local RocksDB directory.
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use widerow_core::Registry;
/// use widerow_storage::RocksTransport;
///
/// let transport = Arc::new(RocksTransport::open("/var/lib/widerow")?);
/// let registry = Registry::default();
/// registry.add_cluster("local")?;
/// registry.add_keyspace("local", "app", transport)?;
/// ```
pub struct RocksTransport {
    db: Db,
    /// Shared block cache (kept alive for DB lifetime).
    cache: Cache,
    path: String,
    /// Definitions by RocksDB family name, mirrored from `__schema`.
    families: RwLock<HashMap<String, ColumnFamilyDef>>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for RocksTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksTransport")
            .field("path", &self.path)
            .field("families", &self.families.read().len())
            .finish()
    }
}

impl RocksTransport {
    /// Open with default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> RocksResult<Self> {
        Self::open_with_config(path, RocksTransportConfig::default())
    }

    /// Open a database, reopening every store family recorded in it.
    ///
    /// # Errors
    /// - `RocksTransportError::InvalidConfig` if `config` fails validation
    /// - `RocksTransportError::OpenFailed` if RocksDB cannot open the path
    /// - `RocksTransportError::Serialization` if a stored definition is corrupt
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: RocksTransportConfig) -> RocksResult<Self> {
        config.validate()?;
        let path_str = path.as_ref().to_string_lossy().to_string();

        let cache = Cache::new_lru_cache(config.block_cache_size);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(config.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        if !config.enable_wal {
            db_opts.set_manual_wal_flush(true);
        }

        // A fresh directory has no family list yet.
        let existing = Db::list_cf(&Options::default(), &path_str).unwrap_or_default();
        let descriptors = get_cf_descriptors(&existing, &cache);

        let db = Db::open_cf_descriptors(&db_opts, &path_str, descriptors).map_err(|e| {
            RocksTransportError::OpenFailed {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;

        let transport = Self {
            db,
            cache,
            path: path_str,
            families: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        };
        transport.load_schema(&existing)?;
        info!(
            path = %transport.path,
            families = transport.families.read().len(),
            "opened rocksdb transport"
        );
        Ok(transport)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check that the schema family and every defined store family are open.
    pub fn health_check(&self) -> RocksResult<()> {
        self.schema_cf()?;
        for (name, def) in self.families.read().iter() {
            self.db
                .cf_handle(name)
                .ok_or_else(|| RocksTransportError::ColumnFamilyNotFound {
                    keyspace: def.keyspace.clone(),
                    name: def.name.clone(),
                })?;
        }
        Ok(())
    }

    /// Flush every family to disk.
    pub fn flush_all(&self) -> RocksResult<()> {
        let schema = self.schema_cf()?;
        self.db
            .flush_cf(&schema)
            .map_err(|e| RocksTransportError::FlushFailed(e.to_string()))?;
        for name in self.families.read().keys() {
            if let Some(cf) = self.db.cf_handle(name) {
                self.db
                    .flush_cf(&cf)
                    .map_err(|e| RocksTransportError::FlushFailed(format!("{}: {}", name, e)))?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Schema
    // ========================================================================

    fn schema_cf(&self) -> RocksResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_SCHEMA)
            .ok_or_else(|| RocksTransportError::ColumnFamilyNotFound {
                keyspace: String::new(),
                name: CF_SCHEMA.to_string(),
            })
    }

    /// Rebuild the in-memory definition map from `__schema`, recreating any
    /// family whose RocksDB column family went missing.
    fn load_schema(&self, on_disk: &[String]) -> RocksResult<()> {
        let schema = self.schema_cf()?;
        let mut loaded = HashMap::new();
        for item in self.db.iterator_cf(&schema, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| RocksTransportError::ReadFailed(e.to_string()))?;
            let def = decode_family_def(&value)?;
            let name = String::from_utf8_lossy(&key).to_string();
            if self.db.cf_handle(&name).is_none() {
                warn!(family = %name, "defined family missing on disk, recreating");
                self.db
                    .create_cf(&name, &data_cf_options(&self.cache))
                    .map_err(|e| RocksTransportError::WriteFailed(e.to_string()))?;
            }
            loaded.insert(name, def);
        }
        drop(schema);

        for name in on_disk {
            if is_data_cf(name) && !loaded.contains_key(name) {
                warn!(family = %name, "rocksdb family has no definition, ignoring it");
            }
        }
        *self.families.write() = loaded;
        Ok(())
    }

    fn family(&self, keyspace: &str, name: &str) -> RocksResult<(Arc<BoundColumnFamily<'_>>, Comparator)> {
        let missing = || RocksTransportError::ColumnFamilyNotFound {
            keyspace: keyspace.to_string(),
            name: name.to_string(),
        };
        let cf_name = data_cf_name(keyspace, name);
        let comparator = self.families.read().get(&cf_name).map(|d| d.comparator).ok_or_else(missing)?;
        let cf = self.db.cf_handle(&cf_name).ok_or_else(missing)?;
        Ok((cf, comparator))
    }

    fn create_family(&self, def: &ColumnFamilyDef) -> RocksResult<()> {
        let _guard = self.write_lock.lock();
        let cf_name = data_cf_name(&def.keyspace, &def.name);
        if let Some(existing) = self.families.read().get(&cf_name) {
            if existing.comparator != def.comparator || existing.column_type != def.column_type {
                return Err(RocksTransportError::SchemaConflict {
                    keyspace: def.keyspace.clone(),
                    name: def.name.clone(),
                    existing: format!("{} {}", existing.column_type, existing.comparator),
                });
            }
            return Ok(());
        }

        if self.db.cf_handle(&cf_name).is_none() {
            self.db
                .create_cf(&cf_name, &data_cf_options(&self.cache))
                .map_err(|e| RocksTransportError::WriteFailed(format!("create {}: {}", cf_name, e)))?;
        }
        let schema = self.schema_cf()?;
        self.db
            .put_cf(&schema, cf_name.as_bytes(), encode_family_def(def)?)
            .map_err(|e| RocksTransportError::WriteFailed(e.to_string()))?;
        self.families.write().insert(cf_name, def.clone());
        debug!(keyspace = %def.keyspace, name = %def.name, comparator = %def.comparator, "created column family");
        Ok(())
    }

    fn drop_family(&self, keyspace: &str, name: &str) -> RocksResult<()> {
        let _guard = self.write_lock.lock();
        let cf_name = data_cf_name(keyspace, name);
        if !self.families.read().contains_key(&cf_name) {
            return Err(RocksTransportError::ColumnFamilyNotFound {
                keyspace: keyspace.to_string(),
                name: name.to_string(),
            });
        }
        let schema = self.schema_cf()?;
        self.db
            .delete_cf(&schema, cf_name.as_bytes())
            .map_err(|e| RocksTransportError::WriteFailed(e.to_string()))?;
        drop(schema);
        self.families.write().remove(&cf_name);
        self.db
            .drop_cf(&cf_name)
            .map_err(|e| RocksTransportError::WriteFailed(format!("drop {}: {}", cf_name, e)))?;
        debug!(keyspace, name, "dropped column family");
        Ok(())
    }

    // ========================================================================
    // Rows
    // ========================================================================

    fn write_row(&self, keyspace: &str, family: &str, row_key: &str, columns: &[Column]) -> RocksResult<()> {
        if row_key.is_empty() {
            return Err(RocksTransportError::InvalidRequest("row key must not be empty".to_string()));
        }
        let (cf, comparator) = self.family(keyspace, family)?;
        let prefix = row_prefix(row_key);
        let mut keyed = Vec::with_capacity(columns.len());
        for column in columns {
            let sort_key = encode_column(comparator, &column.name).map_err(|e| {
                RocksTransportError::InvalidRequest(format!("{}.{}: {}", keyspace, family, e))
            })?;
            let mut key = prefix.clone();
            key.extend(sort_key);
            keyed.push((key, column));
        }

        let _guard = self.write_lock.lock();
        let mut pending: HashMap<Vec<u8>, &Column> = HashMap::with_capacity(keyed.len());
        for (key, column) in keyed {
            let current = match pending.get(&key) {
                Some(c) => Some(c.timestamp),
                None => self
                    .db
                    .get_cf(&cf, &key)
                    .map_err(|e| RocksTransportError::ReadFailed(e.to_string()))?
                    .map(|bytes| StoredCell::decode(&bytes))
                    .transpose()?
                    .map(|cell| cell.timestamp),
            };
            if current.map_or(true, |ts| column.timestamp >= ts) {
                pending.insert(key, column);
            }
        }

        let mut batch = WriteBatch::default();
        for (key, column) in &pending {
            batch.put_cf(&cf, key, StoredCell::encode(column)?);
        }
        self.db
            .write(batch)
            .map_err(|e| {
                RocksTransportError::WriteFailed(format!("{}.{} row '{}': {}", keyspace, family, row_key, e))
            })?;
        trace!(keyspace, family, row_key, columns = columns.len(), applied = pending.len(), "rocksdb write");
        Ok(())
    }

    fn read_rows(
        &self,
        keyspace: &str,
        family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
    ) -> RocksResult<Vec<KeySlice>> {
        let (cf, comparator) = self.family(keyspace, family)?;

        let mut keys: Vec<&RowKey> = row_keys.iter().collect();
        keys.sort();
        keys.dedup();

        let mut slices = Vec::with_capacity(keys.len());
        for row_key in keys {
            let columns = match predicate {
                SlicePredicate::Names(names) => self.read_names(&cf, comparator, row_key, names)?,
                SlicePredicate::Range(range) => self.read_range(&cf, comparator, row_key, range)?,
            };
            if !columns.is_empty() {
                slices.push(KeySlice {
                    row_key: row_key.clone(),
                    columns,
                });
            }
        }
        Ok(slices)
    }

    fn read_names(
        &self,
        cf: &Arc<BoundColumnFamily<'_>>,
        comparator: Comparator,
        row_key: &str,
        names: &[Vec<u8>],
    ) -> RocksResult<Vec<Column>> {
        // Malformed names cannot have been stored.
        let mut sort_keys: Vec<Vec<u8>> = names.iter().filter_map(|n| encode_column(comparator, n).ok()).collect();
        sort_keys.sort();
        sort_keys.dedup();

        let prefix = row_prefix(row_key);
        let mut columns = Vec::new();
        for sort_key in sort_keys {
            let mut key = prefix.clone();
            key.extend_from_slice(&sort_key);
            let stored = self
                .db
                .get_cf(cf, &key)
                .map_err(|e| RocksTransportError::ReadFailed(e.to_string()))?;
            if let Some(bytes) = stored {
                columns.push(to_column(comparator, &sort_key, &bytes)?);
            }
        }
        Ok(columns)
    }

    fn read_range(
        &self,
        cf: &Arc<BoundColumnFamily<'_>>,
        comparator: Comparator,
        row_key: &str,
        range: &SliceRange,
    ) -> RocksResult<Vec<Column>> {
        if range.count == 0 {
            return Ok(Vec::new());
        }
        let bound = |key: &Vec<u8>| -> RocksResult<Option<Vec<u8>>> {
            if key.is_empty() {
                Ok(None)
            } else {
                encode_column(comparator, key).map(Some)
            }
        };
        let (lower, upper) = if range.reverse {
            (bound(&range.finish)?, bound(&range.start)?)
        } else {
            (bound(&range.start)?, bound(&range.finish)?)
        };

        let prefix = row_prefix(row_key);
        let seek = if range.reverse {
            match &upper {
                Some(u) => Some([prefix.as_slice(), u.as_slice()].concat()),
                None => prefix_successor(&prefix),
            }
        } else {
            Some([prefix.as_slice(), lower.as_deref().unwrap_or_default()].concat())
        };
        let direction = if range.reverse { Direction::Reverse } else { Direction::Forward };
        let mode = match &seek {
            Some(key) => IteratorMode::From(key.as_slice(), direction),
            None => IteratorMode::End,
        };

        let mut columns = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item.map_err(|e| RocksTransportError::ReadFailed(e.to_string()))?;
            if !key.starts_with(&prefix) {
                // Walking backwards from the prefix successor may land on
                // the next row first.
                if range.reverse && &*key > prefix.as_slice() {
                    continue;
                }
                break;
            }
            let sort_key = &key[prefix.len()..];
            let past_end = if range.reverse {
                lower.as_deref().is_some_and(|l| sort_key < l)
            } else {
                upper.as_deref().is_some_and(|u| sort_key > u)
            };
            if past_end {
                break;
            }
            columns.push(to_column(comparator, sort_key, &value)?);
            if columns.len() == range.count {
                break;
            }
        }
        Ok(columns)
    }
}

fn to_column(comparator: Comparator, sort_key: &[u8], bytes: &[u8]) -> RocksResult<Column> {
    let cell = StoredCell::decode(bytes)?;
    Ok(Column {
        name: decode_column(comparator, sort_key)?,
        value: cell.value,
        timestamp: cell.timestamp,
    })
}

/// Single-node store: every consistency level is satisfied by the local
/// write, so the level is accepted and ignored.
impl Transport for RocksTransport {
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        _consistency: ConsistencyLevel,
    ) -> TransportResult<()> {
        Ok(self.write_row(keyspace, column_family, row_key, columns)?)
    }

    fn multiget_columns(
        &self,
        keyspace: &str,
        column_family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
        _consistency: ConsistencyLevel,
    ) -> TransportResult<Vec<KeySlice>> {
        Ok(self.read_rows(keyspace, column_family, row_keys, predicate)?)
    }

    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription> {
        let mut column_families: Vec<ColumnFamilyDef> = self
            .families
            .read()
            .values()
            .filter(|d| d.keyspace == keyspace)
            .cloned()
            .collect();
        column_families.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(KeyspaceDescription {
            name: keyspace.to_string(),
            column_families,
        })
    }

    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>> {
        Ok(self.families.read().get(&data_cf_name(keyspace, name)).cloned())
    }

    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()> {
        Ok(self.create_family(def)?)
    }

    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()> {
        Ok(self.drop_family(keyspace, name)?)
    }
}
