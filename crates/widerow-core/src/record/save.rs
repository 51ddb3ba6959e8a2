//! Save protocol.
//!
//! 1. Resolve the row key (explicit, generated, or default).
//! 2. Materialize defaults for unset mandatory attributes; if any mandatory
//!    attribute is still unset, fail without writing.
//! 3. Write the changed columns, plus every auto-set-on-save column, in one
//!    batch to the row and then to each mirror. A persisted record whose
//!    change set is only auto-set-on-save columns skips the write.
//! 4. Clear the changed set.
//! 5. Run the save hooks that are due, in registration order.
//!
//! Steps 3 to 5 are not atomic. When a hook fails the primary row is
//! already written; the failed hook and every hook after it are kept as
//! stale and re-run by the next save.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, error, trace};

use super::Record;
use crate::error::{MappingError, MappingResult};
use crate::index::IndexRecord;
use crate::registry::{KeySelector, SaveHook};
use crate::transport::{now_micros, Column, ConsistencyLevel};
use crate::types::{ColumnKey, RowKey};

impl Record {
    /// Save at the type's write consistency.
    ///
    /// # Errors
    ///
    /// - `MappingError::MissingRowKey` if no row key can be resolved
    /// - `MappingError::MissingRequiredAttributes` if mandatory attributes
    ///   are unset; nothing is written
    /// - `MappingError::Transport` if a write fails
    /// - `MappingError::IndexMaintenance` if the row was written but an index
    ///   hook failed
    pub fn save(&mut self) -> MappingResult<()> {
        let consistency = self.binding.write_consistency();
        self.save_with(consistency)
    }

    /// Save at an explicit write consistency.
    pub fn save_with(&mut self, consistency: ConsistencyLevel) -> MappingResult<()> {
        let binding = Arc::clone(&self.binding);

        let row_key: RowKey = match &self.row_key {
            Some(key) => key.clone(),
            None => match binding.row_key().key_for_save() {
                Some(key) => key?,
                None => {
                    return Err(MappingError::MissingRowKey {
                        record_type: binding.name().to_string(),
                    })
                }
            },
        };

        // Defaults are staged and only committed once the write succeeds.
        let mut staged: Vec<(ColumnKey, Vec<u8>)> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for (name, attribute) in binding.attributes() {
            if !attribute.is_mandatory() {
                continue;
            }
            let column_key = binding.column_key_of(name)?;
            if self.column_values.contains_key(&column_key) {
                continue;
            }
            match attribute.default_internal() {
                Some(value) => staged.push((column_key, value.map_err(|e| e.for_attribute(binding.name(), name))?)),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(MappingError::MissingRequiredAttributes {
                record_type: binding.name().to_string(),
                attributes: missing,
            });
        }

        let mut write_keys: Vec<ColumnKey> = self
            .ordered_column_keys
            .iter()
            .filter(|k| self.column_changed.contains(*k))
            .cloned()
            .chain(staged.iter().map(|(k, _)| k.clone()))
            .collect();

        let auto_only = write_keys
            .iter()
            .all(|k| binding.attribute_for_column(k).1.codec().auto_set_on_save());
        if auto_only && self.persisted {
            trace!(record_type = %binding.name(), row_key = %row_key, "nothing changed, skipping write");
            let due = self.stale_hooks.clone();
            return self.run_hooks(&row_key, due);
        }

        for (name, attribute) in binding.attributes() {
            if !attribute.codec().auto_set_on_save() {
                continue;
            }
            let column_key = binding.column_key_of(name)?;
            if !write_keys.contains(&column_key) {
                write_keys.push(column_key);
            }
        }

        let timestamp = now_micros();
        let mut columns: Vec<Column> = Vec::with_capacity(write_keys.len());
        for key in &write_keys {
            let (name, attribute) = binding.attribute_for_column(key);
            let current = staged
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_slice())
                .or_else(|| self.column_values.get(key).map(Vec::as_slice));
            let Some(current) = current else {
                continue;
            };
            let value = attribute
                .codec()
                .for_saving(current)
                .map_err(|e| e.for_attribute(binding.name(), name))?;
            columns.push(Column {
                name: key.clone(),
                value,
                timestamp,
            });
        }

        let keyspace = binding.keyspace().name();
        let transport = binding.transport();
        if !columns.is_empty() {
            transport.batch_write(keyspace, binding.column_family(), &row_key, &columns, consistency)?;
            for mirror in &self.mirrors {
                transport.batch_write(keyspace, binding.column_family(), mirror, &columns, consistency)?;
            }
        }
        debug!(
            record_type = %binding.name(),
            row_key = %row_key,
            columns = columns.len(),
            mirrors = self.mirrors.len(),
            "saved record"
        );

        // Commit
        self.row_key = Some(row_key.clone());
        for (key, value) in staged {
            self.insert_value(key, value);
        }
        let written: HashSet<ColumnKey> = columns.iter().map(|c| c.name.clone()).collect();
        for column in columns {
            self.insert_value(column.name, column.value);
        }
        self.column_changed.clear();
        let first_save = !self.persisted;
        self.persisted = true;

        let mut due = self.stale_hooks.clone();
        for (i, hook) in binding.save_hooks().iter().enumerate() {
            let triggered = match &hook.selector {
                KeySelector::Fixed(_) => first_save,
                KeySelector::Field { column_key, .. } => first_save || written.contains(column_key),
            };
            if triggered {
                due.insert(i);
            }
        }
        self.run_hooks(&row_key, due)
    }

    fn run_hooks(&mut self, row_key: &str, due: BTreeSet<usize>) -> MappingResult<()> {
        let binding = Arc::clone(&self.binding);
        let due: Vec<usize> = due.into_iter().collect();
        for (pos, &i) in due.iter().enumerate() {
            let Some(hook) = binding.save_hooks().get(i) else {
                continue;
            };
            if let Err(source) = self.run_hook(row_key, hook) {
                self.stale_hooks = due[pos..].iter().copied().collect();
                error!(
                    record_type = %binding.name(),
                    row_key,
                    index = %hook.index_name,
                    error = %source,
                    "index maintenance failed after primary write"
                );
                return Err(MappingError::IndexMaintenance {
                    record_type: binding.name().to_string(),
                    row_key: row_key.to_string(),
                    index: hook.index_name.clone(),
                    source: Box::new(source),
                });
            }
        }
        self.stale_hooks.clear();
        Ok(())
    }

    fn run_hook(&self, row_key: &str, hook: &SaveHook) -> MappingResult<()> {
        let index_key = match &hook.selector {
            KeySelector::Fixed(key) => key.clone(),
            KeySelector::Field {
                name,
                column_key,
                mandatory,
            } => match self.column_values.get(column_key).filter(|v| !v.is_empty()) {
                Some(value) => String::from_utf8(value.clone()).map_err(|e| {
                    MappingError::codec("index_key", format!("{}.{} is not UTF-8: {}", self.binding.name(), name, e))
                })?,
                None if *mandatory => {
                    return Err(MappingError::MissingIndexedField {
                        record_type: self.binding.name().to_string(),
                        index: hook.index_name.clone(),
                        field: name.clone(),
                    })
                }
                None => {
                    trace!(index = %hook.index_name, field = %name, "optional indexed field unset, skipping");
                    return Ok(());
                }
            },
        };

        let mut index = IndexRecord::open(Arc::clone(&hook.index), index_key)?;
        index.append_key(row_key)?;
        index.save()
    }
}
