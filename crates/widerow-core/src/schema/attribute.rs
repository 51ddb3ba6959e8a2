//! Declared attributes.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::codec::{
    AsciiCodec, BooleanCodec, BytesCodec, Codec, DefaultValue, FloatCodec, ForeignKeyCodec, IntegerCodec, JsonCodec,
    TimeCodec, TimeUuidCodec, Utf8Codec,
};
use crate::error::{MappingError, MappingResult};
use crate::types::Value;

/// Record type and attribute name an attribute was bound under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOwner {
    pub record_type: String,
    pub name: String,
}

/// One typed attribute: a column-key codec, a value codec and the policy
/// applied when the value is absent.
///
/// Attributes are mandatory unless marked [`optional`](Attribute::optional).
/// The owner is recorded once, at bind time; binding the same attribute
/// under a second owner or name is a schema error.
pub struct Attribute {
    key_codec: Arc<dyn Codec>,
    codec: Arc<dyn Codec>,
    mandatory: bool,
    default: Option<DefaultValue>,
    owner: OnceLock<AttributeOwner>,
}

impl Attribute {
    /// Attribute stored through `codec`, keyed by its UTF-8 name.
    pub fn new(codec: impl Codec + 'static) -> Self {
        Self::with_codecs(Arc::new(Utf8Codec), Arc::new(codec))
    }

    /// Attribute with an explicit column-key codec.
    pub fn with_codecs(key_codec: Arc<dyn Codec>, codec: Arc<dyn Codec>) -> Self {
        Self {
            key_codec,
            codec,
            mandatory: true,
            default: None,
            owner: OnceLock::new(),
        }
    }

    pub fn text() -> Self {
        Self::new(Utf8Codec)
    }

    pub fn ascii() -> Self {
        Self::new(AsciiCodec)
    }

    pub fn bytes() -> Self {
        Self::new(BytesCodec)
    }

    pub fn integer() -> Self {
        Self::new(IntegerCodec)
    }

    pub fn float() -> Self {
        Self::new(FloatCodec)
    }

    pub fn boolean() -> Self {
        Self::new(BooleanCodec)
    }

    pub fn json() -> Self {
        Self::new(JsonCodec)
    }

    pub fn time() -> Self {
        Self::new(TimeCodec::new())
    }

    pub fn time_uuid() -> Self {
        Self::new(TimeUuidCodec)
    }

    /// Reference to a row of `target`, which may be registered later.
    pub fn foreign_key(target: impl Into<String>) -> Self {
        Self::new(ForeignKeyCodec::new(target))
    }

    /// Allow the attribute to stay unset at save time.
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Value used when the attribute is absent.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Generator called each time a default is needed.
    pub fn with_default_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(f)));
        self
    }

    pub fn key_codec(&self) -> &dyn Codec {
        self.key_codec.as_ref()
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Whether a value can be produced for this attribute without the caller.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.codec.auto_default().is_some()
    }

    /// Explicit default in internal form, if one is declared.
    pub fn explicit_default_internal(&self) -> Option<MappingResult<Vec<u8>>> {
        self.default.as_ref().map(|d| self.codec.to_internal(&d.get()))
    }

    /// Default in internal form: the declared one, else whatever the codec
    /// generates on its own (auto-set timestamps).
    pub fn default_internal(&self) -> Option<MappingResult<Vec<u8>>> {
        self.explicit_default_internal()
            .or_else(|| self.codec.auto_default())
    }

    /// Owner recorded at bind time.
    pub fn owner(&self) -> Option<&AttributeOwner> {
        self.owner.get()
    }

    /// Record the owning type and attribute name.
    ///
    /// Binding again with the same owner and name is a no-op.
    ///
    /// # Errors
    ///
    /// `MappingError::Schema` if the attribute is already bound elsewhere.
    pub fn set_owner_and_name(&self, record_type: &str, name: &str) -> MappingResult<()> {
        let wanted = AttributeOwner {
            record_type: record_type.to_string(),
            name: name.to_string(),
        };
        let bound = self.owner.get_or_init(|| wanted.clone());
        if *bound == wanted {
            Ok(())
        } else {
            Err(MappingError::schema(format!(
                "attribute {}.{} cannot be rebound as {}.{}",
                bound.record_type, bound.name, record_type, name
            )))
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("key_codec", &self.key_codec.name())
            .field("codec", &self.codec.name())
            .field("mandatory", &self.mandatory)
            .field("default", &self.default)
            .field("owner", &self.owner.get())
            .finish()
    }
}
