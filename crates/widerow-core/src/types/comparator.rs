//! Column key sort orders.
//!
//! A column family declares one comparator; the store keeps every row's
//! columns sorted by it. Both transports in this workspace use
//! [`Comparator::compare`] (or a byte encoding consistent with it) so that a
//! slice comes back in the same order regardless of backend.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::time_uuid;

/// Sort order applied to column keys within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Comparator {
    /// Raw byte-lexical order.
    #[default]
    Bytes,
    /// ASCII text, byte order.
    Ascii,
    /// UTF-8 text, byte order.
    Utf8,
    /// Signed 64-bit big-endian integers.
    Long,
    /// 16-byte UUIDs compared as raw bytes.
    LexicalUuid,
    /// Version-1 UUIDs compared by embedded timestamp, then raw bytes.
    TimeUuid,
}

impl Comparator {
    /// All known comparators.
    pub fn all() -> &'static [Comparator] {
        &[
            Comparator::Bytes,
            Comparator::Ascii,
            Comparator::Utf8,
            Comparator::Long,
            Comparator::LexicalUuid,
            Comparator::TimeUuid,
        ]
    }

    /// Store-facing type name, e.g. `"TimeUUIDType"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Bytes => "BytesType",
            Comparator::Ascii => "AsciiType",
            Comparator::Utf8 => "UTF8Type",
            Comparator::Long => "LongType",
            Comparator::LexicalUuid => "LexicalUUIDType",
            Comparator::TimeUuid => "TimeUUIDType",
        }
    }

    /// Parse a store-facing type name. Accepts fully qualified names
    /// (`org.apache.cassandra.db.marshal.UTF8Type`) as well.
    pub fn parse(name: &str) -> Option<Self> {
        let short = name.rsplit('.').next().unwrap_or(name);
        Self::all().iter().copied().find(|c| c.as_str() == short)
    }

    /// Whether columns sort by issuance time. Only time-ordered families
    /// support generated column keys.
    pub fn is_time_ordered(&self) -> bool {
        matches!(self, Comparator::TimeUuid)
    }

    /// Check that a column key is well formed for this comparator.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the key has the wrong
    /// width or encoding.
    pub fn validate(&self, key: &[u8]) -> Result<(), String> {
        match self {
            Comparator::Bytes => Ok(()),
            Comparator::Ascii if key.is_ascii() => Ok(()),
            Comparator::Ascii => Err("column key is not ASCII".to_string()),
            Comparator::Utf8 => std::str::from_utf8(key)
                .map(|_| ())
                .map_err(|e| format!("column key is not UTF-8: {}", e)),
            Comparator::Long if key.len() == 8 => Ok(()),
            Comparator::Long => Err(format!("LongType keys are 8 bytes, got {}", key.len())),
            Comparator::LexicalUuid | Comparator::TimeUuid if key.len() == 16 => Ok(()),
            Comparator::LexicalUuid | Comparator::TimeUuid => {
                Err(format!("{} keys are 16 bytes, got {}", self.as_str(), key.len()))
            }
        }
    }

    /// Compare two column keys. Keys are assumed valid (see [`validate`]).
    ///
    /// [`validate`]: Comparator::validate
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            Comparator::Long if a.len() == 8 && b.len() == 8 => {
                let x = i64::from_be_bytes(a.try_into().unwrap_or([0; 8]));
                let y = i64::from_be_bytes(b.try_into().unwrap_or([0; 8]));
                x.cmp(&y)
            }
            Comparator::TimeUuid if a.len() == 16 && b.len() == 16 => {
                let ta = time_uuid::timestamp_ticks(a);
                let tb = time_uuid::timestamp_ticks(b);
                ta.cmp(&tb).then_with(|| a.cmp(b))
            }
            _ => a.cmp(b),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
