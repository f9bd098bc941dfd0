//! Two-way conversion between policy [`Value`]s and typed host values.
//!
//! The host side is described by serde: a type's `Deserialize` impl drives
//! [`decode`] and its `Serialize` impl drives [`encode`]. Struct keys follow
//! `#[serde(rename)]`, skipped fields are left out, and the registered
//! types in [`crate::types`] are recognized before generic handling.
//!
//! Numbers reach typed targets as exact text. Dynamic targets such as
//! `serde_json::Value` receive every number as `f64`, which is lossy for
//! long mantissas; decode into a typed field or [`crate::Decimal`] when
//! precision matters.

mod de;
pub mod error;
mod ser;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::Timestamp;
use crate::value::Value;

pub use error::{ConvertError, ConvertErrorKind, PathSegment};

/// Text format for timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimeFormat {
    /// RFC 3339 with up to nanosecond fractions.
    #[default]
    Rfc3339Nano,
    /// A `chrono` format string. Parsing requires an offset in the format.
    Custom(String),
}

impl TimeFormat {
    pub(crate) fn parse(&self, text: &str) -> Result<Timestamp, ConvertError> {
        let parsed = match self {
            TimeFormat::Rfc3339Nano => Timestamp::parse_rfc3339(text),
            TimeFormat::Custom(format) => Timestamp::parse_with_format(text, format),
        };
        parsed.map_err(|e| ConvertError::parse("timestamp", format!("{:?}: {}", text, e)))
    }

    pub(crate) fn format(&self, ts: &Timestamp) -> String {
        match self {
            TimeFormat::Rfc3339Nano => ts.to_rfc3339(),
            TimeFormat::Custom(format) => ts.format(format),
        }
    }
}

/// Settings threaded through a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Timestamp text format.
    pub time_format: TimeFormat,
}

impl ConvertOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timestamp format.
    pub fn with_time_format(mut self, format: TimeFormat) -> Self {
        self.time_format = format;
        self
    }
}

/// Converts a policy value into `T`.
pub fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, ConvertError> {
    decode_with(value, &ConvertOptions::default())
}

/// Converts a policy value into `T` with explicit options.
pub fn decode_with<T: DeserializeOwned>(
    value: &Value,
    options: &ConvertOptions,
) -> Result<T, ConvertError> {
    T::deserialize(de::ValueDeserializer::new(value, options))
}

/// Converts a host value into a policy value.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ConvertError> {
    encode_with(value, &ConvertOptions::default())
}

/// Converts a host value into a policy value with explicit options.
pub fn encode_with<T: Serialize + ?Sized>(
    value: &T,
    options: &ConvertOptions,
) -> Result<Value, ConvertError> {
    value.serialize(ser::ValueSerializer::new(options))
}
