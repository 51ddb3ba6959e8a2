//! Leaf codecs for plain scalar values.
//!
//! Numbers and booleans travel as decimal text so rows stay readable from
//! any client of the store.

use crate::error::{MappingError, MappingResult};
use crate::types::Value;

use super::Codec;

fn unsupported(codec: &'static str, value: &Value) -> MappingError {
    MappingError::codec(codec, format!("cannot encode a {} value", value.kind()))
}

fn utf8<'a>(codec: &'static str, wire: &'a [u8]) -> MappingResult<&'a str> {
    std::str::from_utf8(wire).map_err(|e| MappingError::codec(codec, format!("invalid UTF-8: {}", e)))
}

/// Raw bytes, passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn text_wire(&self) -> bool {
        false
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(unsupported(self.name(), other)),
        }
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        Ok(Value::Bytes(wire.to_vec()))
    }
}

/// UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        match value {
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            Value::Bytes(b) => Ok(utf8(self.name(), b)?.as_bytes().to_vec()),
            Value::Integer(i) => Ok(i.to_string().into_bytes()),
            other => Err(unsupported(self.name(), other)),
        }
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        Ok(Value::Text(utf8(self.name(), wire)?.to_string()))
    }

    fn to_identity(&self, wire: &[u8]) -> MappingResult<Vec<u8>> {
        utf8(self.name(), wire)?;
        Ok(wire.to_vec())
    }
}

/// 7-bit ASCII text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiCodec;

impl AsciiCodec {
    fn check(&self, bytes: &[u8]) -> MappingResult<()> {
        if bytes.is_ascii() {
            Ok(())
        } else {
            Err(MappingError::codec(self.name(), "value is not ASCII"))
        }
    }
}

impl Codec for AsciiCodec {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        let bytes = match value {
            Value::Text(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Integer(i) => i.to_string().into_bytes(),
            other => return Err(unsupported(self.name(), other)),
        };
        self.check(&bytes)?;
        Ok(bytes)
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        self.check(wire)?;
        Ok(Value::Text(String::from_utf8_lossy(wire).into_owned()))
    }

    fn to_identity(&self, wire: &[u8]) -> MappingResult<Vec<u8>> {
        self.check(wire)?;
        Ok(wire.to_vec())
    }
}

/// Signed 64-bit integer stored as decimal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl Codec for IntegerCodec {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        let n = match value {
            Value::Integer(i) => *i,
            // Truncates toward zero.
            Value::Float(f) if f.is_finite() => *f as i64,
            Value::Boolean(b) => i64::from(*b),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| MappingError::codec(self.name(), format!("'{}': {}", s, e)))?,
            other => return Err(unsupported(self.name(), other)),
        };
        Ok(n.to_string().into_bytes())
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        let text = utf8(self.name(), wire)?;
        text.trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| MappingError::codec(self.name(), format!("'{}': {}", text, e)))
    }
}

/// 64-bit float stored as decimal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

impl Codec for FloatCodec {
    fn name(&self) -> &'static str {
        "float"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        let x = match value {
            Value::Float(f) => *f,
            Value::Integer(i) => *i as f64,
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| MappingError::codec(self.name(), format!("'{}': {}", s, e)))?,
            other => return Err(unsupported(self.name(), other)),
        };
        Ok(x.to_string().into_bytes())
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        let text = utf8(self.name(), wire)?;
        text.trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| MappingError::codec(self.name(), format!("'{}': {}", text, e)))
    }
}

/// Boolean stored as `"1"` or `"0"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl Codec for BooleanCodec {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        let b = match value {
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Text(s) => matches!(s.trim(), "1" | "true" | "True"),
            other => return Err(unsupported(self.name(), other)),
        };
        Ok(if b { b"1".to_vec() } else { b"0".to_vec() })
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        Ok(Value::Boolean(matches!(wire, b"1" | b"true" | b"True")))
    }
}

/// Arbitrary JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        let doc = match value {
            Value::Json(j) => j.clone(),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            other => return Err(unsupported(self.name(), other)),
        };
        serde_json::to_vec(&doc).map_err(|e| MappingError::codec(self.name(), e.to_string()))
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        serde_json::from_slice(wire)
            .map(Value::Json)
            .map_err(|e| MappingError::codec(self.name(), e.to_string()))
    }
}
