//! Index records.
//!
//! An index row maps generated column keys to row keys of a target type.
//! Time-ordered indexes (`TimeUUIDType`) get a fresh time UUID per append,
//! so columns come back in insertion order; byte-ordered ones take explicit
//! keys through [`IndexRecord::insert`].
//!
//! # Uniqueness
//!
//! A unique index refuses a target that is already present in the row,
//! either in memory or in storage. The stored check reads the whole row up
//! to `MappingConfig::uniqueness_ceiling` columns. A row holding exactly
//! that many is still checked in full; one holding more fails rather than
//! risk a false "unique".
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use widerow_core::schema::{Attribute, IndexDescriptor, RecordSchema, RowKeyDescriptor};
//! use widerow_core::{IndexRecord, MemoryTransport, Record, Registry, SchemaSync};
//!
//! let registry = Registry::default();
//! registry.add_cluster("main").unwrap();
//! registry.add_keyspace("main", "app", Arc::new(MemoryTransport::new())).unwrap();
//! let user = registry
//!     .register_record_type(
//!         RecordSchema::new("User")
//!             .row_key(RowKeyDescriptor::new("uuid").autogenerate())
//!             .attribute("username", Attribute::text())
//!             .index("all", IndexDescriptor::all()),
//!     )
//!     .unwrap();
//! registry.sync_schema(SchemaSync::CreateMissing).unwrap();
//!
//! let mut dave = Record::new(Arc::clone(&user));
//! dave.set("username", "dave").unwrap();
//! dave.save().unwrap();
//!
//! let mut all = IndexRecord::open(Arc::clone(user.index("all").unwrap()), "!ALL!").unwrap();
//! all.load().unwrap();
//! let users = all.resolve().unwrap();
//! assert_eq!(users.len(), 1);
//! assert_eq!(users[0].get("username").unwrap().unwrap().as_str(), Some("dave"));
//! ```

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::loader::{load_multi, LoadOptions};
use crate::record::Record;
use crate::registry::RecordBinding;
use crate::transport::{SliceRange, SlicePredicate};
use crate::types::time_uuid::next_time_uuid;
use crate::types::{ColumnKey, RecordRef, RowKey, Value};

/// One row of an index type.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    record: Record,
    target: String,
}

impl IndexRecord {
    /// Index row `key` of an index binding. Nothing is fetched.
    ///
    /// # Errors
    ///
    /// - `MappingError::Precondition` if `binding` is not an index type
    /// - `MappingError::InvalidArgument` if `key` is empty
    pub fn open(binding: Arc<RecordBinding>, key: impl Into<RowKey>) -> MappingResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(MappingError::InvalidArgument(format!(
                "index '{}' needs a non-empty row key",
                binding.name()
            )));
        }
        let target = Self::target_of(&binding)?;
        Ok(Self {
            record: Record::with_key(binding, key),
            target,
        })
    }

    /// Index row at the binding's default key.
    ///
    /// # Errors
    ///
    /// `MappingError::MissingRowKey` if the index declares no default key.
    pub fn with_default_key(binding: Arc<RecordBinding>) -> MappingResult<Self> {
        let key = match binding.row_key().key_for_load() {
            Some(key) => key?,
            None => {
                return Err(MappingError::MissingRowKey {
                    record_type: binding.name().to_string(),
                })
            }
        };
        Self::open(binding, key)
    }

    /// Open and load index row `key`.
    pub fn load_with_key(binding: Arc<RecordBinding>, key: impl Into<RowKey>) -> MappingResult<Self> {
        let mut index = Self::open(binding, key)?;
        index.load()?;
        Ok(index)
    }

    fn target_of(binding: &RecordBinding) -> MappingResult<String> {
        binding.index_target().map(str::to_string).ok_or_else(|| {
            MappingError::Precondition(format!("'{}' is not an index type", binding.name()))
        })
    }

    /// Record type this index points at.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn load(&mut self) -> MappingResult<()> {
        self.record.load()
    }

    pub fn load_with(&mut self, options: &LoadOptions) -> MappingResult<()> {
        self.record.load_with(options)
    }

    pub fn save(&mut self) -> MappingResult<()> {
        self.record.save()
    }

    // ========================================================================
    // Appending
    // ========================================================================

    /// Append a reference to `target` under a fresh time UUID.
    ///
    /// Returns the new column key, or `None` if the index is unique and
    /// already holds the target.
    ///
    /// # Errors
    ///
    /// - `MappingError::MissingRowKey` if `target` has no row key
    /// - `MappingError::Codec` if `target` is of the wrong type
    /// - `MappingError::Precondition` if the index is not time ordered
    /// - `MappingError::ColumnCeilingExceeded` from the uniqueness check
    pub fn append(&mut self, target: &Record) -> MappingResult<Option<ColumnKey>> {
        let reference = target.as_reference()?;
        self.append_value(Value::Reference(reference))
    }

    /// Append a target row key under a fresh time UUID.
    pub fn append_key(&mut self, row_key: &str) -> MappingResult<Option<ColumnKey>> {
        self.append_value(Value::Reference(RecordRef::new(self.target.clone(), row_key)))
    }

    fn append_value(&mut self, value: Value) -> MappingResult<Option<ColumnKey>> {
        let comparator = self.record.binding().comparator();
        if !comparator.is_time_ordered() {
            return Err(MappingError::Precondition(format!(
                "index '{}' is ordered by {}; use insert with an explicit key",
                self.record.record_type(),
                comparator
            )));
        }
        let internal = self.encode_target(&value)?;
        if !self.is_unique(&internal)? {
            debug!(
                index = %self.record.record_type(),
                row_key = self.record.row_key().unwrap_or_default(),
                "target already indexed, skipping append"
            );
            return Ok(None);
        }
        let column_key = next_time_uuid().as_bytes().to_vec();
        self.record.set_internal(column_key.clone(), internal);
        Ok(Some(column_key))
    }

    /// Store `target` under an explicit column key.
    ///
    /// Returns `false` if the index is unique and already holds the target.
    ///
    /// # Errors
    ///
    /// - `MappingError::InvalidArgument` if the comparator rejects the key
    /// - `MappingError::Codec` if the target cannot be encoded
    pub fn insert(&mut self, column_key: impl Into<ColumnKey>, target: impl Into<Value>) -> MappingResult<bool> {
        let column_key = column_key.into();
        self.record
            .binding()
            .comparator()
            .validate(&column_key)
            .map_err(MappingError::InvalidArgument)?;
        let internal = self.encode_target(&target.into())?;
        if !self.is_unique(&internal)? {
            return Ok(false);
        }
        self.record.set_internal(column_key, internal);
        Ok(true)
    }

    fn encode_target(&self, value: &Value) -> MappingResult<Vec<u8>> {
        self.record.binding().fallback().codec().to_internal(value)
    }

    /// Whether `candidate` (an encoded row key) may be added.
    ///
    /// Always true for non-unique indexes.
    ///
    /// # Errors
    ///
    /// `MappingError::ColumnCeilingExceeded` if the stored row holds more
    /// columns than the uniqueness ceiling.
    pub fn is_unique(&self, candidate: &[u8]) -> MappingResult<bool> {
        let binding = self.record.binding();
        if !binding.fallback().codec().is_unique() {
            return Ok(true);
        }
        if self.record.column_values.values().any(|v| v.as_slice() == candidate) {
            return Ok(false);
        }
        let Some(row_key) = self.record.row_key() else {
            return Ok(true);
        };

        let ceiling = binding.config().uniqueness_ceiling;
        let slices = binding.transport().multiget_columns(
            binding.keyspace().name(),
            binding.column_family(),
            &[row_key.to_string()],
            &SlicePredicate::Range(SliceRange::all(ceiling.saturating_add(1))),
            binding.read_consistency(),
        )?;
        let stored = slices
            .into_iter()
            .find(|slice| slice.row_key == row_key)
            .map(|slice| slice.columns)
            .unwrap_or_default();
        if stored.len() > ceiling {
            return Err(MappingError::ColumnCeilingExceeded {
                column_family: binding.column_family().to_string(),
                row_key: row_key.to_string(),
                count: stored.len(),
                ceiling,
            });
        }
        Ok(!stored.iter().any(|c| c.value.as_slice() == candidate))
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Target row keys in column order.
    pub fn target_keys(&self) -> MappingResult<Vec<RowKey>> {
        self.record
            .column_keys()
            .iter()
            .filter_map(|k| self.record.column_values.get(k))
            .map(|v| {
                String::from_utf8(v.clone())
                    .map_err(|e| MappingError::codec("foreign_key", format!("row key is not UTF-8: {}", e)))
            })
            .collect()
    }

    /// Entries as lazy references, in column order.
    pub fn references(&self) -> MappingResult<Vec<RecordRef>> {
        Ok(self
            .target_keys()?
            .into_iter()
            .map(|key| RecordRef::new(self.target.clone(), key))
            .collect())
    }

    /// Load every target record, in column order.
    ///
    /// Targets whose rows hold no columns are omitted.
    pub fn resolve(&self) -> MappingResult<Vec<Record>> {
        self.resolve_with(&LoadOptions::default())
    }

    pub fn resolve_with(&self, options: &LoadOptions) -> MappingResult<Vec<Record>> {
        let keys = self.target_keys()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.record.binding().registry()?.record_type(&self.target)?;
        load_multi(&target, &keys, options)
    }

    /// `(column key, target)` pairs in column order. Column keys are in
    /// external form; targets whose rows hold no columns are omitted.
    pub fn resolve_items(&self) -> MappingResult<Vec<(Value, Record)>> {
        let keys = self.target_keys()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let target = self.record.binding().registry()?.record_type(&self.target)?;
        let loaded: HashMap<RowKey, Record> = load_multi(&target, &keys, &LoadOptions::unordered())?
            .into_iter()
            .filter_map(|r| r.row_key().map(str::to_string).map(|k| (k, r)))
            .collect();

        let key_codec = self.record.binding().fallback().key_codec();
        let mut items = Vec::with_capacity(keys.len());
        for (column_key, row_key) in self.record.column_keys().iter().zip(keys) {
            let record = match loaded.get(&row_key) {
                Some(record) => record.clone(),
                None => continue,
            };
            items.push((key_codec.to_external(column_key)?, record));
        }
        Ok(items)
    }

    pub fn as_record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

impl Deref for IndexRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}
