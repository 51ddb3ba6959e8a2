//! Poison codec for attributes nobody declared.
//!
//! Model records fall back to this codec for any column key that does not
//! match a declared attribute. Every conversion fails with a schema error,
//! so unbound data never passes through silently.

use crate::error::{MappingError, MappingResult};
use crate::types::Value;

use super::Codec;

const UNBOUND: &str = "no codec bound for this attribute";

/// Codec that rejects every conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingCodec;

impl Codec for MissingCodec {
    fn name(&self) -> &'static str {
        "missing"
    }

    fn text_wire(&self) -> bool {
        false
    }

    fn to_internal(&self, _value: &Value) -> MappingResult<Vec<u8>> {
        Err(MappingError::schema(UNBOUND))
    }

    fn to_external(&self, _wire: &[u8]) -> MappingResult<Value> {
        Err(MappingError::schema(UNBOUND))
    }

    fn to_display(&self, _wire: &[u8]) -> MappingResult<String> {
        Err(MappingError::schema(UNBOUND))
    }

    fn to_identity(&self, _wire: &[u8]) -> MappingResult<Vec<u8>> {
        Err(MappingError::schema(UNBOUND))
    }

    fn for_saving(&self, _current: &[u8]) -> MappingResult<Vec<u8>> {
        Err(MappingError::schema(UNBOUND))
    }
}
