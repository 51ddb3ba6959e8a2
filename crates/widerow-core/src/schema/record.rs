//! Record type declarations.

use std::sync::Arc;

use super::{Attribute, IndexDescriptor, RowKeyDescriptor};
use crate::transport::ConsistencyLevel;
use crate::types::{Comparator, STANDARD_COLUMN_TYPE};

/// Declaration of a record type, consumed once by
/// [`Registry::register_record_type`](crate::Registry::register_record_type).
///
/// ```
/// use widerow_core::schema::{Attribute, IndexDescriptor, RecordSchema, RowKeyDescriptor};
///
/// let schema = RecordSchema::new("User")
///     .row_key(RowKeyDescriptor::new("uuid").autogenerate())
///     .attribute("username", Attribute::text())
///     .attribute("age", Attribute::integer().optional())
///     .index("all_users", IndexDescriptor::all());
/// assert_eq!(schema.name(), "User");
/// ```
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub(crate) name: String,
    pub(crate) keyspace: Option<String>,
    pub(crate) column_family: Option<String>,
    pub(crate) column_type: String,
    pub(crate) comparator: Comparator,
    pub(crate) comment: Option<String>,
    pub(crate) row_keys: Vec<RowKeyDescriptor>,
    pub(crate) attributes: Vec<(String, Arc<Attribute>)>,
    pub(crate) indexes: Vec<(String, IndexDescriptor)>,
    pub(crate) auto_timestamp: bool,
    pub(crate) read_consistency: Option<ConsistencyLevel>,
    pub(crate) write_consistency: Option<ConsistencyLevel>,
}

impl RecordSchema {
    /// Schema with no attributes. The column family defaults to `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyspace: None,
            column_family: None,
            column_type: STANDARD_COLUMN_TYPE.to_string(),
            comparator: Comparator::Utf8,
            comment: None,
            row_keys: Vec::new(),
            attributes: Vec::new(),
            indexes: Vec::new(),
            auto_timestamp: true,
            read_consistency: None,
            write_consistency: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keyspace to register in; the first registered keyspace otherwise.
    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn column_family(mut self, name: impl Into<String>) -> Self {
        self.column_family = Some(name.into());
        self
    }

    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Declare the row key. Exactly one is required at bind time.
    pub fn row_key(mut self, descriptor: RowKeyDescriptor) -> Self {
        self.row_keys.push(descriptor);
        self
    }

    pub fn attribute(self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.shared_attribute(name, Arc::new(attribute))
    }

    /// Declare an attribute already held elsewhere. Binding fails if it
    /// belongs to another type.
    pub fn shared_attribute(mut self, name: impl Into<String>, attribute: Arc<Attribute>) -> Self {
        self.attributes.push((name.into(), attribute));
        self
    }

    pub fn index(mut self, name: impl Into<String>, descriptor: IndexDescriptor) -> Self {
        self.indexes.push((name.into(), descriptor));
        self
    }

    /// Add `created_at` and `last_modified` (on by default).
    pub fn auto_timestamp(mut self, enabled: bool) -> Self {
        self.auto_timestamp = enabled;
        self
    }

    pub fn read_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.read_consistency = Some(level);
        self
    }

    pub fn write_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.write_consistency = Some(level);
        self
    }
}
