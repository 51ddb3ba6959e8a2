//! Attribute codecs.
//!
//! A codec converts one attribute between three representations:
//!
//! | Representation | Type | Used for |
//! |----------------|------|----------|
//! | internal / identity | `Vec<u8>` | what records hold and what is written |
//! | external | [`Value`] | what application code reads and writes |
//! | display | `String` | human-readable output |
//!
//! `to_internal` and `to_external` are inverses for every value that
//! survives a round trip through storage. `to_identity` is the passthrough
//! applied to bytes that are already internal, such as columns just read
//! off the wire.
//!
//! All conversions are pure. Codecs that auto-populate (time stamps) expose
//! that through [`Codec::auto_default`] and [`Codec::for_saving`] rather than
//! by touching record state.

mod missing;
mod reference;
mod scalar;
mod time;


use std::fmt;
use std::sync::Arc;

pub use missing::MissingCodec;
pub use reference::ForeignKeyCodec;
pub use scalar::{AsciiCodec, BooleanCodec, BytesCodec, FloatCodec, IntegerCodec, JsonCodec, Utf8Codec};
pub use time::{TimeCodec, TimeUuidCodec};

use crate::error::MappingResult;
use crate::types::Value;

/// Bidirectional converter for one attribute.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Convert an external value into its wire bytes.
    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>>;

    /// Convert wire bytes into an external value.
    fn to_external(&self, wire: &[u8]) -> MappingResult<Value>;

    /// Render wire bytes for humans. Defaults to the external form.
    fn to_display(&self, wire: &[u8]) -> MappingResult<String> {
        Ok(self.to_external(wire)?.to_string())
    }

    /// Accept bytes that are already internal.
    fn to_identity(&self, wire: &[u8]) -> MappingResult<Vec<u8>> {
        Ok(wire.to_vec())
    }

    /// Value to serialize at save time given the current one.
    fn for_saving(&self, current: &[u8]) -> MappingResult<Vec<u8>> {
        Ok(current.to_vec())
    }

    /// Whether [`for_saving`](Codec::for_saving) regenerates the value on
    /// every save. Such attributes are re-serialized regardless of their
    /// dirty flag.
    fn auto_set_on_save(&self) -> bool {
        false
    }

    /// Value the codec generates on its own for an absent attribute.
    fn auto_default(&self) -> Option<MappingResult<Vec<u8>>> {
        None
    }

    /// Whether the wire bytes are always UTF-8 text, so a stored value can
    /// serve as an index row key.
    fn text_wire(&self) -> bool {
        true
    }

    /// Whether an index over this codec rejects duplicate targets.
    fn is_unique(&self) -> bool {
        false
    }
}

/// Default for an attribute with no value.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed external value.
    Static(Value),
    /// A zero-argument generator called each time a default is needed.
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the external default.
    pub fn get(&self) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Generator(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}
