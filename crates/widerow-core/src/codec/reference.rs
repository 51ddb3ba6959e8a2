//! Foreign-key codec: a reference to a row of another record type.

use crate::error::{MappingError, MappingResult};
use crate::types::{RecordRef, Value};

use super::Codec;

/// Stores the target's raw row key; reads back a lazy [`RecordRef`].
///
/// The target is held by name so that a type may refer to one registered
/// later. Loading the target is left to
/// [`Registry::resolve`](crate::Registry::resolve).
#[derive(Debug, Clone)]
pub struct ForeignKeyCodec {
    target: String,
    unique: bool,
}

impl ForeignKeyCodec {
    /// Reference to rows of `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            unique: false,
        }
    }

    /// Reject duplicate targets when used as an index value codec.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Name of the referenced record type.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Codec for ForeignKeyCodec {
    fn name(&self) -> &'static str {
        "foreign_key"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        match value {
            Value::Reference(r) if r.record_type == self.target => Ok(r.row_key.as_bytes().to_vec()),
            Value::Reference(r) => Err(MappingError::codec(
                self.name(),
                format!("expected a reference to '{}', got '{}'", self.target, r.record_type),
            )),
            Value::Text(key) => Ok(key.as_bytes().to_vec()),
            Value::Bytes(key) => std::str::from_utf8(key)
                .map(|k| k.as_bytes().to_vec())
                .map_err(|e| MappingError::codec(self.name(), format!("row key is not UTF-8: {}", e))),
            other => Err(MappingError::codec(
                self.name(),
                format!("cannot encode a {} value", other.kind()),
            )),
        }
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        let key = std::str::from_utf8(wire)
            .map_err(|e| MappingError::codec(self.name(), format!("row key is not UTF-8: {}", e)))?;
        Ok(Value::Reference(RecordRef::new(self.target.clone(), key)))
    }

    fn to_display(&self, wire: &[u8]) -> MappingResult<String> {
        Ok(String::from_utf8_lossy(wire).into_owned())
    }

    fn is_unique(&self) -> bool {
        self.unique
    }
}
