//! Index declarations.
//!
//! An [`IndexDescriptor`] is declared on an owning record type and turned
//! into a generated index type named `Auto_<OwnerFamily>_<attr>` at bind
//! time. An [`IndexSchema`] declares a standalone index type that the
//! application maintains itself.

use crate::transport::ConsistencyLevel;
use crate::types::{Comparator, RowKey};

/// Row key of the all-items index row.
pub const ALL_KEY: &str = "!ALL!";

/// What an index descriptor indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// Every saved instance of the owner, under one sentinel row.
    All,
    /// Instances of the owner grouped by the value of one of its fields.
    Secondary { field: String },
    /// References to `target` rows, kept per owner instance and appended by
    /// the application.
    Manual { target: String },
}

/// Index attribute declared on a record type.
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    kind: IndexKind,
    row_key_name: Option<String>,
    default_key: Option<RowKey>,
    auto_save: bool,
    comparator: Comparator,
    unique: bool,
}

impl IndexDescriptor {
    fn with_kind(kind: IndexKind) -> Self {
        Self {
            kind,
            row_key_name: None,
            default_key: None,
            auto_save: false,
            comparator: Comparator::TimeUuid,
            unique: false,
        }
    }

    /// Index of every saved instance under the `"!ALL!"` row.
    pub fn all() -> Self {
        Self {
            default_key: Some(ALL_KEY.to_string()),
            auto_save: true,
            ..Self::with_kind(IndexKind::All)
        }
    }

    /// Index of instances by the value of `field`. The row key of each
    /// index row is that value.
    pub fn secondary(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            row_key_name: Some(field.clone()),
            auto_save: true,
            ..Self::with_kind(IndexKind::Secondary { field })
        }
    }

    /// Per-instance list of references to `target`, obtained through
    /// [`Record::index`](crate::Record::index).
    pub fn manual(target: impl Into<String>) -> Self {
        Self::with_kind(IndexKind::Manual { target: target.into() })
    }

    pub fn row_key_name(mut self, name: impl Into<String>) -> Self {
        self.row_key_name = Some(name.into());
        self
    }

    pub fn default_key(mut self, key: impl Into<RowKey>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Column order of the index rows. Non-time-ordered indexes take
    /// explicit column keys through `insert`.
    pub fn ordered_by(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Shorthand for UTF-8 ordered column keys.
    pub fn byte_ordered(self) -> Self {
        self.ordered_by(Comparator::Utf8)
    }

    /// Skip appends whose target is already present.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    pub fn row_key(&self) -> Option<&str> {
        self.row_key_name.as_deref()
    }

    pub fn default_row_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    pub fn is_auto_save(&self) -> bool {
        self.auto_save
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Standalone index record type pointing at rows of `target`.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub(crate) name: String,
    pub(crate) target: String,
    pub(crate) keyspace: Option<String>,
    pub(crate) column_family: Option<String>,
    pub(crate) row_key_name: String,
    pub(crate) default_key: Option<RowKey>,
    pub(crate) comparator: Comparator,
    pub(crate) unique: bool,
    pub(crate) comment: Option<String>,
    pub(crate) read_consistency: Option<ConsistencyLevel>,
    pub(crate) write_consistency: Option<ConsistencyLevel>,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            keyspace: None,
            column_family: None,
            row_key_name: "key".to_string(),
            default_key: None,
            comparator: Comparator::TimeUuid,
            unique: false,
            comment: None,
            read_consistency: None,
            write_consistency: None,
        }
    }

    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn column_family(mut self, name: impl Into<String>) -> Self {
        self.column_family = Some(name.into());
        self
    }

    pub fn row_key_name(mut self, name: impl Into<String>) -> Self {
        self.row_key_name = name.into();
        self
    }

    pub fn default_key(mut self, key: impl Into<RowKey>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    pub fn ordered_by(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
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
