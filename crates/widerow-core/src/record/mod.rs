//! Record instances.
//!
//! A [`Record`] is one row of a registered type: an optional row key plus
//! the populated columns, each held in internal form next to a changed
//! flag. Writes go through the attribute's codec and mark the column
//! changed; [`save`](Record::save) writes only changed columns, and
//! [`load`](Record::load) replaces everything and marks nothing changed.
//!
//! A record is not synchronized. Share it across threads only behind a
//! lock.

mod load;
mod save;


use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{MappingError, MappingResult};
use crate::index::IndexRecord;
use crate::registry::{BindingKind, RecordBinding, PATH_SEPARATOR};
use crate::types::{ColumnKey, RecordRef, RowKey, Value};

/// One row of a registered record type.
#[derive(Clone)]
pub struct Record {
    pub(crate) binding: Arc<RecordBinding>,
    pub(crate) row_key: Option<RowKey>,
    pub(crate) ordered_column_keys: Vec<ColumnKey>,
    pub(crate) column_values: HashMap<ColumnKey, Vec<u8>>,
    pub(crate) column_changed: HashSet<ColumnKey>,
    pub(crate) mirrors: Vec<RowKey>,
    pub(crate) persisted: bool,
    pub(crate) stale_hooks: BTreeSet<usize>,
}

impl Record {
    /// Empty record with no row key.
    pub fn new(binding: Arc<RecordBinding>) -> Self {
        Self {
            binding,
            row_key: None,
            ordered_column_keys: Vec::new(),
            column_values: HashMap::new(),
            column_changed: HashSet::new(),
            mirrors: Vec::new(),
            persisted: false,
            stale_hooks: BTreeSet::new(),
        }
    }

    /// Empty record addressing `row_key`.
    pub fn with_key(binding: Arc<RecordBinding>, row_key: impl Into<RowKey>) -> Self {
        let mut record = Self::new(binding);
        record.row_key = Some(row_key.into());
        record
    }

    /// Load the row stored under `row_key`.
    pub fn load_key(binding: Arc<RecordBinding>, row_key: impl Into<RowKey>) -> MappingResult<Self> {
        let mut record = Self::with_key(binding, row_key);
        record.load()?;
        Ok(record)
    }

    pub fn binding(&self) -> &Arc<RecordBinding> {
        &self.binding
    }

    pub fn record_type(&self) -> &str {
        self.binding.name()
    }

    pub fn row_key(&self) -> Option<&str> {
        self.row_key.as_deref()
    }

    /// Set the row key. References are reduced to their row key.
    pub fn set_row_key(&mut self, key: impl Into<Value>) -> MappingResult<()> {
        self.row_key = Some(self.binding.row_key().coerce(&key.into())?);
        Ok(())
    }

    /// Whether the row was saved by, or loaded into, this record.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Whether any column changed since the last save or load.
    pub fn is_dirty(&self) -> bool {
        !self.column_changed.is_empty()
    }

    /// Column keys changed since the last save or load, in insertion order.
    pub fn changed_columns(&self) -> impl Iterator<Item = &[u8]> {
        self.ordered_column_keys
            .iter()
            .filter(|k| self.column_changed.contains(*k))
            .map(Vec::as_slice)
    }

    /// Index hooks that failed and will re-run on the next save.
    pub fn stale_indexes(&self) -> Vec<&str> {
        self.stale_hooks
            .iter()
            .filter_map(|&i| self.binding.save_hooks().get(i))
            .map(|h| h.index_name.as_str())
            .collect()
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    /// Set an attribute through its codec and mark it changed. Setting the
    /// row key attribute sets the row key.
    ///
    /// # Errors
    ///
    /// - `MappingError::Schema` if the type has no such attribute
    /// - `MappingError::Codec` if the codec rejects the value
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> MappingResult<()> {
        if name == self.binding.row_key().name() {
            return self.set_row_key(value);
        }
        let attribute = self.binding.require_attribute(name)?;
        let internal = attribute
            .codec()
            .to_internal(&value.into())
            .map_err(|e| e.for_attribute(self.binding.name(), name))?;
        let column_key = self.binding.column_key_of(name)?;
        self.set_internal(column_key, internal);
        Ok(())
    }

    /// Set many attributes. Stops at the first failure; earlier ones stay
    /// set.
    pub fn update<I, K, V>(&mut self, pairs: I) -> MappingResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in pairs {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Drop an optional attribute's value from the record. Returns whether
    /// it was set. The stored column is left in place; only the in-memory
    /// value and any pending change go away.
    ///
    /// # Errors
    ///
    /// - `MappingError::Schema` if the type has no such attribute
    /// - `MappingError::Precondition` if the attribute is mandatory or is
    ///   the row key
    pub fn remove(&mut self, name: &str) -> MappingResult<bool> {
        if name == self.binding.row_key().name() {
            return Err(MappingError::Precondition(format!(
                "cannot remove the row key '{}' of {}",
                name,
                self.binding.name()
            )));
        }
        let attribute = self.binding.require_attribute(name)?;
        if attribute.is_mandatory() {
            return Err(MappingError::Precondition(format!(
                "cannot remove mandatory attribute {}.{}",
                self.binding.name(),
                name
            )));
        }
        let column_key = self.binding.column_key_of(name)?;
        self.column_changed.remove(&column_key);
        self.ordered_column_keys.retain(|k| k != &column_key);
        Ok(self.column_values.remove(&column_key).is_some())
    }

    pub(crate) fn set_internal(&mut self, column_key: ColumnKey, value: Vec<u8>) {
        self.insert_value(column_key.clone(), value);
        self.column_changed.insert(column_key);
    }

    fn insert_value(&mut self, column_key: ColumnKey, value: Vec<u8>) {
        if !self.column_values.contains_key(&column_key) {
            self.ordered_column_keys.push(column_key.clone());
        }
        self.column_values.insert(column_key, value);
    }

    /// External value of an attribute, `None` when unset.
    pub fn get(&self, name: &str) -> MappingResult<Option<Value>> {
        if name == self.binding.row_key().name() {
            return Ok(self.row_key.clone().map(Value::Text));
        }
        let attribute = self.binding.require_attribute(name)?;
        match self.internal(name)? {
            Some(wire) => attribute
                .codec()
                .to_external(wire)
                .map(Some)
                .map_err(|e| e.for_attribute(self.binding.name(), name)),
            None => Ok(None),
        }
    }

    /// External value of an attribute, or `default` when unset.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> MappingResult<Value> {
        Ok(self.get(name)?.unwrap_or_else(|| default.into()))
    }

    /// External value of an attribute that must be set.
    ///
    /// # Errors
    ///
    /// `MappingError::AttributeNotSet` when the attribute holds no value.
    pub fn require(&self, name: &str) -> MappingResult<Value> {
        self.get(name)?.ok_or_else(|| MappingError::AttributeNotSet {
            record_type: self.binding.name().to_string(),
            attribute: name.to_string(),
        })
    }

    /// Human-readable form of an attribute.
    pub fn display_value(&self, name: &str) -> MappingResult<Option<String>> {
        let attribute = self.binding.require_attribute(name)?;
        match self.internal(name)? {
            Some(wire) => attribute
                .codec()
                .to_display(wire)
                .map(Some)
                .map_err(|e| e.for_attribute(self.binding.name(), name)),
            None => Ok(None),
        }
    }

    /// Internal bytes of an attribute.
    pub fn internal(&self, name: &str) -> MappingResult<Option<&[u8]>> {
        let column_key = self.binding.column_key_of(name)?;
        Ok(self.column_values.get(&column_key).map(Vec::as_slice))
    }

    /// Whether an attribute holds a value.
    pub fn contains(&self, name: &str) -> bool {
        self.binding
            .column_key_of(name)
            .map(|k| self.column_values.contains_key(&k))
            .unwrap_or(false)
    }

    /// Number of populated columns.
    pub fn len(&self) -> usize {
        self.ordered_column_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_column_keys.is_empty()
    }

    /// Populated column keys in insertion order (storage order after a load).
    pub fn column_keys(&self) -> &[ColumnKey] {
        &self.ordered_column_keys
    }

    fn decode(&self, column_key: &[u8]) -> MappingResult<(Value, Value)> {
        let (name, attribute) = self.binding.attribute_for_column(column_key);
        let wire = self.column_values.get(column_key).map(Vec::as_slice).unwrap_or_default();
        let key = attribute
            .key_codec()
            .to_external(column_key)
            .map_err(|e| e.for_attribute(self.binding.name(), name))?;
        let value = attribute
            .codec()
            .to_external(wire)
            .map_err(|e| e.for_attribute(self.binding.name(), name))?;
        Ok((key, value))
    }

    /// Column keys in external form.
    pub fn keys(&self) -> MappingResult<Vec<Value>> {
        self.iter_external().map(|item| item.map(|(k, _)| k)).collect()
    }

    /// Column values in external form.
    pub fn values(&self) -> MappingResult<Vec<Value>> {
        self.iter_external().map(|item| item.map(|(_, v)| v)).collect()
    }

    /// `(key, value)` pairs in external form, in column order.
    pub fn iter_external(&self) -> impl Iterator<Item = MappingResult<(Value, Value)>> + '_ {
        self.ordered_column_keys.iter().map(move |k| self.decode(k))
    }

    /// `(key, value)` pairs in display form, in column order.
    pub fn iter_display(&self) -> impl Iterator<Item = MappingResult<(String, String)>> + '_ {
        self.ordered_column_keys.iter().map(move |k| {
            let (name, attribute) = self.binding.attribute_for_column(k);
            let wire = self.column_values.get(k).map(Vec::as_slice).unwrap_or_default();
            let key = attribute.key_codec().to_display(k);
            let value = attribute.codec().to_display(wire);
            key.and_then(|k| value.map(|v| (k, v)))
                .map_err(|e| e.for_attribute(self.binding.name(), name))
        })
    }

    /// Mandatory attributes with neither a value nor a default.
    pub fn missing_attributes(&self) -> Vec<String> {
        self.binding
            .attributes()
            .filter(|(name, attribute)| attribute.is_mandatory() && !attribute.has_default() && !self.contains(name))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Whether a save would pass the mandatory-attribute check.
    pub fn is_complete(&self) -> bool {
        self.missing_attributes().is_empty()
    }

    // ========================================================================
    // Identity and navigation
    // ========================================================================

    /// Also write every save to `row_key`.
    pub fn add_mirror(&mut self, row_key: impl Into<RowKey>) {
        self.mirrors.push(row_key.into());
    }

    pub fn mirrors(&self) -> &[RowKey] {
        &self.mirrors
    }

    /// Lazy reference to this row.
    ///
    /// # Errors
    ///
    /// `MappingError::MissingRowKey` if no row key is set.
    pub fn as_reference(&self) -> MappingResult<RecordRef> {
        self.row_key
            .as_ref()
            .map(|k| RecordRef::new(self.binding.name(), k.clone()))
            .ok_or_else(|| MappingError::MissingRowKey {
                record_type: self.binding.name().to_string(),
            })
    }

    /// `cluster/keyspace/family/row_key`, or the family path without a key.
    pub fn path(&self) -> String {
        match &self.row_key {
            Some(key) => [self.binding.path().as_str(), key.as_str()].join(PATH_SEPARATOR),
            None => self.binding.path(),
        }
    }

    /// Manual index declared on this type, addressed by this record's row
    /// key.
    ///
    /// # Errors
    ///
    /// - `MappingError::Schema` if no index of that name is declared
    /// - `MappingError::Precondition` if the index is maintained by save
    ///   hooks
    /// - `MappingError::MissingRowKey` if this record has no row key
    pub fn index(&self, name: &str) -> MappingResult<IndexRecord> {
        let index = self.binding.index(name)?;
        if !matches!(index.kind(), BindingKind::Index { manual: true, .. }) {
            return Err(MappingError::Precondition(format!(
                "index '{}' of '{}' is maintained on save; open it through its binding",
                name,
                self.binding.name()
            )));
        }
        let key = self.as_reference()?.row_key;
        IndexRecord::open(Arc::clone(index), key)
    }

    /// Load the record a foreign-key attribute points at.
    ///
    /// Returns `None` when the attribute is unset or the target row holds
    /// no columns.
    pub fn follow(&self, name: &str) -> MappingResult<Option<Record>> {
        let reference = match self.get(name)? {
            Some(Value::Reference(r)) => r,
            Some(other) => {
                return Err(MappingError::InvalidArgument(format!(
                    "{}.{} holds a {} value, not a reference",
                    self.binding.name(),
                    name,
                    other.kind()
                )))
            }
            None => return Ok(None),
        };
        self.binding.registry()?.resolve(&reference)
    }
}

impl PartialEq for Record {
    /// Records are equal when they address the same row of the same type.
    fn eq(&self, other: &Self) -> bool {
        self.binding.name() == other.binding.name()
            && self.row_key.is_some()
            && self.row_key == other.row_key
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}: {{", self.binding.name(), self.row_key.as_deref().unwrap_or("?"))?;
        for (i, item) in self.iter_display().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match item {
                Ok((k, v)) => write!(f, "{}: {}", k, v)?,
                Err(e) => write!(f, "<{}>", e)?,
            }
        }
        f.write_str("}>")
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("record_type", &self.binding.name())
            .field("row_key", &self.row_key)
            .field("columns", &self.ordered_column_keys.len())
            .field("changed", &self.column_changed.len())
            .field("persisted", &self.persisted)
            .finish()
    }
}
