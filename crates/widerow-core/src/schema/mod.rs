//! Declarative schema types.
//!
//! Schemas are plain values built by the application and handed to the
//! [`Registry`](crate::Registry), which validates them and returns an
//! immutable [`RecordBinding`](crate::RecordBinding).

mod attribute;
mod index;
mod record;
mod row_key;

pub use attribute::{Attribute, AttributeOwner};
pub use index::{IndexDescriptor, IndexKind, IndexSchema, ALL_KEY};
pub use record::RecordSchema;
pub use row_key::RowKeyDescriptor;

/// Attribute stamped on the first save of every auto-timestamped type.
pub const CREATED_AT: &str = "created_at";

/// Attribute stamped on every save of an auto-timestamped type.
pub const LAST_MODIFIED: &str = "last_modified";
