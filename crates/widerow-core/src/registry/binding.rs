//! Validated, immutable record type bindings.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use super::{Keyspace, Registry, RegistryState};
use crate::config::MappingConfig;
use crate::error::{MappingError, MappingResult};
use crate::schema::{Attribute, RowKeyDescriptor};
use crate::transport::{ColumnFamilyDef, ConsistencyLevel, Transport};
use crate::types::{ColumnKey, Comparator, RowKey, Value};

/// What a binding describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Named attributes stored under their names.
    Model,
    /// References to rows of `target` under generated column keys.
    Index { target: String, manual: bool },
}

/// How a save hook picks the index row for a saved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    /// Always the same row (the all-items sentinel, or a declared default).
    Fixed(RowKey),
    /// The value of a field of the saved record.
    Field {
        name: String,
        column_key: ColumnKey,
        mandatory: bool,
    },
}

/// Index maintenance run after each successful save of the owner.
#[derive(Debug, Clone)]
pub struct SaveHook {
    pub index_name: String,
    pub index: Arc<RecordBinding>,
    pub selector: KeySelector,
}

/// A registered record type.
///
/// Holds everything a [`Record`](crate::Record) needs at runtime: codecs by
/// column key, the row key policy, the keyspace and its transport, generated
/// indexes and the save hooks that maintain them.
pub struct RecordBinding {
    pub(crate) name: String,
    pub(crate) column_family: String,
    pub(crate) column_type: String,
    pub(crate) comparator: Comparator,
    pub(crate) comment: Option<String>,
    pub(crate) keyspace: Arc<Keyspace>,
    pub(crate) registry: Weak<RegistryState>,
    pub(crate) row_key: RowKeyDescriptor,
    pub(crate) attributes: Vec<(String, Arc<Attribute>)>,
    pub(crate) column_index: HashMap<ColumnKey, usize>,
    pub(crate) fallback: Arc<Attribute>,
    pub(crate) kind: BindingKind,
    pub(crate) indexes: Vec<(String, Arc<RecordBinding>)>,
    pub(crate) save_hooks: Vec<SaveHook>,
    pub(crate) read_consistency: ConsistencyLevel,
    pub(crate) write_consistency: ConsistencyLevel,
    pub(crate) config: MappingConfig,
}

impl RecordBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }

    pub fn transport(&self) -> &dyn Transport {
        self.keyspace.transport()
    }

    pub fn row_key(&self) -> &RowKeyDescriptor {
        &self.row_key
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn is_index(&self) -> bool {
        matches!(self.kind, BindingKind::Index { .. })
    }

    /// Target type name of an index binding.
    pub fn index_target(&self) -> Option<&str> {
        match &self.kind {
            BindingKind::Index { target, .. } => Some(target),
            BindingKind::Model => None,
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn read_consistency(&self) -> ConsistencyLevel {
        self.read_consistency
    }

    pub fn write_consistency(&self) -> ConsistencyLevel {
        self.write_consistency
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Arc<Attribute>)> {
        self.attributes.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Declared attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Declared attribute by name, or a schema error naming the type.
    pub fn require_attribute(&self, name: &str) -> MappingResult<&Arc<Attribute>> {
        self.attribute(name).ok_or_else(|| {
            MappingError::schema(format!("'{}' has no attribute '{}'", self.name, name))
        })
    }

    /// Codec pair for a stored column key: the declared attribute, else the
    /// fallback (the poison codec for models, the target field for indexes).
    pub fn attribute_for_column(&self, column_key: &[u8]) -> (&str, &Arc<Attribute>) {
        match self.column_index.get(column_key) {
            Some(&i) => (self.attributes[i].0.as_str(), &self.attributes[i].1),
            None => ("*", &self.fallback),
        }
    }

    /// Column key an attribute name is stored under.
    pub fn column_key_of(&self, name: &str) -> MappingResult<ColumnKey> {
        let attribute = self.require_attribute(name)?;
        attribute
            .key_codec()
            .to_internal(&Value::from(name))
            .map_err(|e| e.for_attribute(&self.name, name))
    }

    /// Generated index type by the name it was declared under.
    pub fn index(&self, name: &str) -> MappingResult<&Arc<RecordBinding>> {
        self.indexes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
            .ok_or_else(|| MappingError::schema(format!("'{}' declares no index '{}'", self.name, name)))
    }

    pub fn indexes(&self) -> impl Iterator<Item = (&str, &Arc<RecordBinding>)> {
        self.indexes.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn save_hooks(&self) -> &[SaveHook] {
        &self.save_hooks
    }

    /// Field used for index values and unbound columns.
    pub fn fallback(&self) -> &Arc<Attribute> {
        &self.fallback
    }

    /// The registry this type was registered with.
    ///
    /// # Errors
    ///
    /// `MappingError::Configuration` if the registry has been dropped.
    pub fn registry(&self) -> MappingResult<Registry> {
        self.registry
            .upgrade()
            .map(Registry::from_state)
            .ok_or_else(|| MappingError::Configuration(format!("registry of '{}' has been dropped", self.name)))
    }

    /// Schema tuple consumed by schema verification.
    pub fn column_family_def(&self) -> ColumnFamilyDef {
        ColumnFamilyDef {
            keyspace: self.keyspace.name().to_string(),
            name: self.column_family.clone(),
            column_type: self.column_type.clone(),
            comparator: self.comparator,
            comment: self.comment.clone(),
        }
    }

    /// `cluster/keyspace/family`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.keyspace.path(), self.column_family)
    }
}

impl fmt::Debug for RecordBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordBinding")
            .field("name", &self.name)
            .field("path", &self.path())
            .field("comparator", &self.comparator)
            .field("kind", &self.kind)
            .field("attributes", &self.attributes.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("indexes", &self.indexes.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}
