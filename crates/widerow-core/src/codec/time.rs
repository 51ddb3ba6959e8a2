//! Time codecs.
//!
//! [`TimeCodec`] stores wall-clock instants as Unix seconds in decimal text,
//! optionally with a six-digit microsecond fraction. It can auto-populate on
//! the first save, on every save, or both. [`TimeUuidCodec`] stores 16-byte
//! version-1 UUIDs, the column key of time-ordered indexes.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::{MappingError, MappingResult};
use crate::types::{time_uuid, Value};

use super::Codec;

/// Unix-seconds timestamp.
#[derive(Debug, Clone, Copy)]
pub struct TimeCodec {
    microseconds: bool,
    autoset_on_create: bool,
    autoset_on_save: bool,
}

impl TimeCodec {
    /// Plain timestamp with microsecond precision and no auto-population.
    pub fn new() -> Self {
        Self {
            microseconds: true,
            autoset_on_create: false,
            autoset_on_save: false,
        }
    }

    /// Timestamp populated with "now" when first saved without a value.
    pub fn created() -> Self {
        Self {
            autoset_on_create: true,
            ..Self::new()
        }
    }

    /// Timestamp regenerated on every save.
    pub fn modified() -> Self {
        Self {
            autoset_on_save: true,
            ..Self::new()
        }
    }

    /// Store whole seconds only.
    pub fn whole_seconds(mut self) -> Self {
        self.microseconds = false;
        self
    }

    fn format(&self, t: DateTime<Utc>) -> Vec<u8> {
        let text = if self.microseconds {
            format!("{}.{:06}", t.timestamp(), t.timestamp_subsec_micros())
        } else {
            t.timestamp().to_string()
        };
        text.into_bytes()
    }

    fn parse(&self, text: &str) -> MappingResult<DateTime<Utc>> {
        let bad = |msg: String| MappingError::codec("time", format!("'{}': {}", text, msg));
        let (secs, frac) = match text.trim().split_once('.') {
            Some((s, f)) => (s, f),
            None => (text.trim(), ""),
        };
        let secs: i64 = secs.parse().map_err(|e| bad(format!("{}", e)))?;
        let micros = if frac.is_empty() {
            0
        } else {
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad("fraction is not decimal".to_string()));
            }
            let mut digits: String = frac.chars().take(6).collect();
            while digits.len() < 6 {
                digits.push('0');
            }
            digits.parse::<u32>().map_err(|e| bad(format!("{}", e)))?
        };
        DateTime::from_timestamp(secs, micros * 1_000).ok_or_else(|| bad("out of range".to_string()))
    }
}

impl Default for TimeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for TimeCodec {
    fn name(&self) -> &'static str {
        "time"
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        match value {
            Value::Time(t) => Ok(self.format(*t)),
            Value::Integer(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|t| self.format(t))
                .ok_or_else(|| MappingError::codec(self.name(), format!("{} is out of range", secs))),
            Value::Text(s) => Ok(self.format(self.parse(s)?)),
            other => Err(MappingError::codec(
                self.name(),
                format!("cannot encode a {} value", other.kind()),
            )),
        }
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        let text = std::str::from_utf8(wire).map_err(|e| MappingError::codec(self.name(), e.to_string()))?;
        self.parse(text).map(Value::Time)
    }

    fn to_display(&self, wire: &[u8]) -> MappingResult<String> {
        let t = match self.to_external(wire)? {
            Value::Time(t) => t,
            other => return Ok(other.to_string()),
        };
        let format = if self.microseconds {
            SecondsFormat::Micros
        } else {
            SecondsFormat::Secs
        };
        Ok(t.to_rfc3339_opts(format, true))
    }

    fn for_saving(&self, current: &[u8]) -> MappingResult<Vec<u8>> {
        if self.autoset_on_save {
            Ok(self.format(Utc::now()))
        } else {
            Ok(current.to_vec())
        }
    }

    fn auto_set_on_save(&self) -> bool {
        self.autoset_on_save
    }

    fn auto_default(&self) -> Option<MappingResult<Vec<u8>>> {
        if self.autoset_on_create || self.autoset_on_save {
            Some(Ok(self.format(Utc::now())))
        } else {
            None
        }
    }
}

/// Version-1 UUID held as 16 raw bytes.
///
/// The external form is a [`Uuid`] (rendered as 32 hex characters); the
/// display form is the wall-clock time embedded in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeUuidCodec;

impl TimeUuidCodec {
    fn check(&self, wire: &[u8]) -> MappingResult<()> {
        if wire.len() == 16 {
            Ok(())
        } else {
            Err(MappingError::codec(
                self.name(),
                format!("expected 16 bytes, got {}", wire.len()),
            ))
        }
    }
}

impl Codec for TimeUuidCodec {
    fn name(&self) -> &'static str {
        "timeuuid"
    }

    fn text_wire(&self) -> bool {
        false
    }

    fn to_internal(&self, value: &Value) -> MappingResult<Vec<u8>> {
        match value {
            Value::Uuid(u) => Ok(u.as_bytes().to_vec()),
            Value::Bytes(b) => {
                self.check(b)?;
                Ok(b.clone())
            }
            Value::Text(s) => Uuid::parse_str(s)
                .map(|u| u.as_bytes().to_vec())
                .map_err(|e| MappingError::codec(self.name(), format!("'{}': {}", s, e))),
            other => Err(MappingError::codec(
                self.name(),
                format!("cannot encode a {} value", other.kind()),
            )),
        }
    }

    fn to_external(&self, wire: &[u8]) -> MappingResult<Value> {
        Uuid::from_slice(wire)
            .map(Value::Uuid)
            .map_err(|e| MappingError::codec(self.name(), e.to_string()))
    }

    fn to_display(&self, wire: &[u8]) -> MappingResult<String> {
        self.check(wire)?;
        match time_uuid::to_datetime(wire) {
            Some(t) => Ok(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            None => self.to_external(wire).map(|v| v.to_string()),
        }
    }

    fn to_identity(&self, wire: &[u8]) -> MappingResult<Vec<u8>> {
        self.check(wire)?;
        Ok(wire.to_vec())
    }
}
