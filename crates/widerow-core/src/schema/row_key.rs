//! Row key descriptor.

use std::sync::Arc;

use uuid::Uuid;

use crate::codec::DefaultValue;
use crate::error::{MappingError, MappingResult};
use crate::types::{RowKey, Value};

/// Governs a record type's row key: its name, and how a key is produced
/// when a record is saved without one.
#[derive(Debug, Clone)]
pub struct RowKeyDescriptor {
    name: String,
    autogenerate: bool,
    default: Option<DefaultValue>,
}

impl RowKeyDescriptor {
    /// Row key that must be supplied by the caller.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            autogenerate: false,
            default: None,
        }
    }

    /// Generate a random key (32 hex characters) when none is set.
    pub fn autogenerate(mut self) -> Self {
        self.autogenerate = true;
        self
    }

    /// Fixed key used when none is set.
    pub fn with_default(mut self, key: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(key.into()));
        self
    }

    /// Generated key used when none is set.
    pub fn with_default_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(f)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_autogenerated(&self) -> bool {
        self.autogenerate
    }

    /// Convert a value to a raw row key. References yield their target's key.
    ///
    /// # Errors
    ///
    /// `MappingError::InvalidArgument` for empty keys or values with no key
    /// form.
    pub fn coerce(&self, value: &Value) -> MappingResult<RowKey> {
        let key = match value {
            Value::Text(s) => s.clone(),
            Value::Reference(r) => r.row_key.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Uuid(u) => u.simple().to_string(),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| MappingError::InvalidArgument(format!("row key is not UTF-8: {}", e)))?,
            other => {
                return Err(MappingError::InvalidArgument(format!(
                    "a {} value cannot be used as a row key",
                    other.kind()
                )))
            }
        };
        if key.is_empty() {
            return Err(MappingError::InvalidArgument("row key must not be empty".to_string()));
        }
        Ok(key)
    }

    /// Key for a record saved without one: a fresh random key when
    /// autogenerating, else the default.
    pub fn key_for_save(&self) -> Option<MappingResult<RowKey>> {
        if self.autogenerate {
            return Some(Ok(Uuid::new_v4().simple().to_string()));
        }
        self.key_for_load()
    }

    /// Key for a record loaded without one: only the default applies.
    pub fn key_for_load(&self) -> Option<MappingResult<RowKey>> {
        self.default.as_ref().map(|d| self.coerce(&d.get()))
    }
}
