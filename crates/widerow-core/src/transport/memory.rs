//! In-process transport.
//!
//! Rows live in memory, columns kept sorted by the family's comparator, so
//! slices behave like the real store. Every successful `batch_write` is
//! appended to a write log that tests inspect to count RPCs and check which
//! columns were sent.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::{
    Column, ColumnFamilyDef, ConsistencyLevel, KeySlice, KeyspaceDescription, SlicePredicate, SliceRange, Transport,
    TransportError, TransportResult,
};
use crate::types::{Comparator, RowKey};

/// One logged `batch_write` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub keyspace: String,
    pub column_family: String,
    pub row_key: RowKey,
    pub columns: Vec<Column>,
    pub consistency: ConsistencyLevel,
}

impl WriteRecord {
    /// Column keys written, in the order sent.
    pub fn column_names(&self) -> Vec<&[u8]> {
        self.columns.iter().map(|c| c.name.as_slice()).collect()
    }
}

#[derive(Debug)]
struct MemoryFamily {
    def: ColumnFamilyDef,
    rows: BTreeMap<RowKey, Vec<Column>>,
}

impl MemoryFamily {
    fn write(&mut self, row_key: &str, columns: &[Column]) {
        let comparator = self.def.comparator;
        let row = self.rows.entry(row_key.to_string()).or_default();
        for column in columns {
            match row.binary_search_by(|c| comparator.compare(&c.name, &column.name)) {
                Ok(pos) => {
                    if column.timestamp >= row[pos].timestamp {
                        row[pos] = column.clone();
                    }
                }
                Err(pos) => row.insert(pos, column.clone()),
            }
        }
    }

    fn slice(&self, row: &[Column], predicate: &SlicePredicate) -> Vec<Column> {
        let comparator = self.def.comparator;
        match predicate {
            SlicePredicate::Names(names) => row
                .iter()
                .filter(|c| names.iter().any(|n| n == &c.name))
                .cloned()
                .collect(),
            SlicePredicate::Range(range) => slice_range(comparator, row, range),
        }
    }
}

fn slice_range(comparator: Comparator, row: &[Column], range: &SliceRange) -> Vec<Column> {
    let (lower, upper) = if range.reverse {
        (&range.finish, &range.start)
    } else {
        (&range.start, &range.finish)
    };
    let within = |c: &&Column| {
        (lower.is_empty() || comparator.compare(&c.name, lower) != Ordering::Less)
            && (upper.is_empty() || comparator.compare(&c.name, upper) != Ordering::Greater)
    };
    if range.reverse {
        row.iter().rev().filter(within).take(range.count).cloned().collect()
    } else {
        row.iter().filter(within).take(range.count).cloned().collect()
    }
}

/// In-memory [`Transport`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    families: RwLock<HashMap<(String, String), MemoryFamily>>,
    log: Mutex<Vec<WriteRecord>>,
}

impl MemoryTransport {
    /// Empty store with no column families.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful write since creation or the last
    /// [`clear_write_log`](Self::clear_write_log).
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.log.lock().clone()
    }

    /// Writes logged against one column family.
    pub fn writes_to(&self, column_family: &str) -> Vec<WriteRecord> {
        self.log
            .lock()
            .iter()
            .filter(|w| w.column_family == column_family)
            .cloned()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.log.lock().len()
    }

    pub fn clear_write_log(&self) {
        self.log.lock().clear();
    }

    /// Number of columns stored under one row.
    pub fn column_count(&self, keyspace: &str, column_family: &str, row_key: &str) -> usize {
        self.families
            .read()
            .get(&(keyspace.to_string(), column_family.to_string()))
            .and_then(|f| f.rows.get(row_key))
            .map_or(0, Vec::len)
    }
}

fn unknown(keyspace: &str, name: &str) -> TransportError {
    TransportError::UnknownColumnFamily {
        keyspace: keyspace.to_string(),
        name: name.to_string(),
    }
}

impl Transport for MemoryTransport {
    fn batch_write(
        &self,
        keyspace: &str,
        column_family: &str,
        row_key: &str,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> TransportResult<()> {
        if row_key.is_empty() {
            return Err(TransportError::InvalidRequest("row key must not be empty".to_string()));
        }
        let mut families = self.families.write();
        let family = families
            .get_mut(&(keyspace.to_string(), column_family.to_string()))
            .ok_or_else(|| unknown(keyspace, column_family))?;
        for column in columns {
            family.def.comparator.validate(&column.name).map_err(|msg| {
                TransportError::InvalidRequest(format!("{}.{}: {}", keyspace, column_family, msg))
            })?;
        }
        family.write(row_key, columns);
        drop(families);

        trace!(keyspace, column_family, row_key, columns = columns.len(), "memory write");
        self.log.lock().push(WriteRecord {
            keyspace: keyspace.to_string(),
            column_family: column_family.to_string(),
            row_key: row_key.to_string(),
            columns: columns.to_vec(),
            consistency,
        });
        Ok(())
    }

    fn multiget_columns(
        &self,
        keyspace: &str,
        column_family: &str,
        row_keys: &[RowKey],
        predicate: &SlicePredicate,
        _consistency: ConsistencyLevel,
    ) -> TransportResult<Vec<KeySlice>> {
        let families = self.families.read();
        let family = families
            .get(&(keyspace.to_string(), column_family.to_string()))
            .ok_or_else(|| unknown(keyspace, column_family))?;

        // Rows come back in row-key order, not request order.
        let mut keys: Vec<&RowKey> = row_keys.iter().collect();
        keys.sort();
        keys.dedup();

        Ok(keys
            .into_iter()
            .filter_map(|key| {
                family.rows.get(key).map(|row| KeySlice {
                    row_key: key.clone(),
                    columns: family.slice(row, predicate),
                })
            })
            .collect())
    }

    fn describe_keyspace(&self, keyspace: &str) -> TransportResult<KeyspaceDescription> {
        let mut column_families: Vec<ColumnFamilyDef> = self
            .families
            .read()
            .values()
            .filter(|f| f.def.keyspace == keyspace)
            .map(|f| f.def.clone())
            .collect();
        column_families.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(KeyspaceDescription {
            name: keyspace.to_string(),
            column_families,
        })
    }

    fn describe_column_family(&self, keyspace: &str, name: &str) -> TransportResult<Option<ColumnFamilyDef>> {
        Ok(self
            .families
            .read()
            .get(&(keyspace.to_string(), name.to_string()))
            .map(|f| f.def.clone()))
    }

    fn create_column_family(&self, def: &ColumnFamilyDef) -> TransportResult<()> {
        let mut families = self.families.write();
        let key = (def.keyspace.clone(), def.name.clone());
        if let Some(existing) = families.get(&key) {
            if existing.def.comparator != def.comparator || existing.def.column_type != def.column_type {
                return Err(TransportError::InvalidRequest(format!(
                    "column family '{}.{}' already exists with comparator {}",
                    def.keyspace, def.name, existing.def.comparator
                )));
            }
            return Ok(());
        }
        debug!(keyspace = %def.keyspace, name = %def.name, comparator = %def.comparator, "created column family");
        families.insert(
            key,
            MemoryFamily {
                def: def.clone(),
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn drop_column_family(&self, keyspace: &str, name: &str) -> TransportResult<()> {
        self.families
            .write()
            .remove(&(keyspace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| unknown(keyspace, name))
    }
}
