//! Core value and key types shared by codecs, records and transports.

mod comparator;
pub mod time_uuid;
mod value;

pub use comparator::Comparator;
pub use value::{RecordRef, Value};

/// Primary identifier of one row within a column family.
pub type RowKey = String;

/// Column key as written to the store (opaque bytes once encoded).
pub type ColumnKey = Vec<u8>;

/// Column type reported for every column family this crate declares.
pub const STANDARD_COLUMN_TYPE: &str = "Standard";
