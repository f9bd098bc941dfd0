//! Registered host types with dedicated conversions.
//!
//! [`Decimal`] and [`Timestamp`] are matched by type identity before any
//! struct or scalar handling, and [`StringSet`] is the host form of a
//! policy set of strings. Each type announces itself to the converter
//! through a private newtype name; other serde formats only see the
//! inner string or sequence.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rust_decimal::Decimal as RawDecimal;
use serde::de::{self, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub(crate) const DECIMAL_TOKEN: &str = "$policy_bridge::private::Decimal";
pub(crate) const TIMESTAMP_TOKEN: &str = "$policy_bridge::private::Timestamp";
pub(crate) const SET_TOKEN: &str = "$policy_bridge::private::Set";

/// Struct name `serde_json` uses for numbers kept as exact text.
pub(crate) const JSON_NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Text of the zero timestamp, used when a fixed-size target is padded.
pub(crate) const ZERO_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

/// Arbitrary-precision decimal that converts to and from policy numbers
/// without going through a float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(pub RawDecimal);

impl Decimal {
    /// Wraps a `rust_decimal` value.
    pub fn new(value: RawDecimal) -> Self {
        Decimal(value)
    }

    /// Returns the wrapped value.
    pub fn into_inner(self) -> RawDecimal {
        self.0
    }

    /// Text with trailing fractional zeros removed.
    pub fn to_normalized_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl From<RawDecimal> for Decimal {
    fn from(value: RawDecimal) -> Self {
        Decimal(value)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RawDecimal::from(value))
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawDecimal::from_str(s)
            .or_else(|_| RawDecimal::from_scientific(s))
            .map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_normalized_string())
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(DECIMAL_TOKEN, &self.to_normalized_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(DECIMAL_TOKEN, DecimalVisitor)
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        v.parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal(RawDecimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        RawDecimal::try_from(v)
            .map(Decimal)
            .map_err(|_| E::invalid_value(Unexpected::Float(v), &self))
    }

    /// JSON numbers that do not fit `i64`/`u64` arrive as a one-entry map
    /// holding their text.
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Decimal, A::Error> {
        match map.next_key::<String>()? {
            Some(key) if key == JSON_NUMBER_TOKEN => {
                let text: String = map.next_value()?;
                text.parse()
                    .map_err(|_| de::Error::invalid_value(Unexpected::Str(&text), &self))
            }
            _ => Err(de::Error::invalid_type(Unexpected::Map, &self)),
        }
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<Decimal, D::Error> {
        d.deserialize_any(self)
    }
}

/// Value type of presence-only maps.
///
/// `HashMap<String, Present>` encodes to a set of its keys and decodes from
/// a set or from the keys of an object. Any unit struct works the same way.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Present;

/// Point in time with nanosecond precision and its original UTC offset.
///
/// The text form is RFC 3339 (`2024-01-02T03:04:05.123456789Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<FixedOffset>);

impl Timestamp {
    /// Parses RFC 3339 text.
    pub fn parse_rfc3339(text: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(text).map(Timestamp)
    }

    /// Parses text with a `chrono` format string. The format must carry an
    /// offset.
    pub fn parse_with_format(text: &str, format: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_str(text, format).map(Timestamp)
    }

    /// RFC 3339 text, `Z` for UTC, fractional seconds only as long as needed.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Formats with a `chrono` format string.
    pub fn format(&self, format: &str) -> String {
        self.0.format(format).to_string()
    }

    /// Returns the wrapped value.
    pub fn into_inner(self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Timestamp(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(TIMESTAMP_TOKEN, &self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(TIMESTAMP_TOKEN, TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an RFC 3339 timestamp")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
        Timestamp::parse_rfc3339(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<Timestamp, D::Error> {
        d.deserialize_str(self)
    }
}

/// Set of strings. Encodes to a policy set and decodes from either a set
/// of strings or an object (keys only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StringSet(pub BTreeSet<String>);

impl StringSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member. Returns false if it was already present.
    pub fn insert(&mut self, member: impl Into<String>) -> bool {
        self.0.insert(member.into())
    }

    /// Membership test.
    pub fn contains(&self, member: &str) -> bool {
        self.0.contains(member)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Members in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StringSet(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for StringSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(SET_TOKEN, &self.0)
    }
}

impl<'de> Deserialize<'de> for StringSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(SET_TOKEN, StringSetVisitor)
    }
}

struct StringSetVisitor;

impl<'de> Visitor<'de> for StringSetVisitor {
    type Value = StringSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a set of strings")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StringSet, A::Error> {
        let mut members = BTreeSet::new();
        while let Some(member) = seq.next_element::<String>()? {
            members.insert(member);
        }
        Ok(StringSet(members))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<StringSet, D::Error> {
        d.deserialize_seq(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_normalized_text() {
        let d: Decimal = "123.4500000".parse().unwrap();
        assert_eq!(d.to_string(), "123.45");
        assert_eq!(d, "123.45".parse().unwrap());
    }

    #[test]
    fn test_decimal_scientific_text() {
        let d: Decimal = "1.5e3".parse().unwrap();
        assert_eq!(d, Decimal::from(1500));
    }

    #[test]
    fn test_foreign_formats_see_inner_text() {
        let d: Decimal = "10.50".parse().unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"10.5\"");
        let back: Decimal = serde_json::from_str("\"10.5\"").unwrap();
        assert_eq!(back, d);
        let from_number: Decimal = serde_json::from_str("7").unwrap();
        assert_eq!(from_number, Decimal::from(7));
        let from_fraction: Decimal = serde_json::from_str("0.10000000000000000001").unwrap();
        assert_eq!(from_fraction.to_string(), "0.10000000000000000001");

        let set: StringSet = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["a","b"]"#);
        let back: StringSet = serde_json::from_str(r#"["a","a","b"]"#).unwrap();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn test_timestamp_text_round_trip() {
        let ts = Timestamp::parse_rfc3339("2024-03-01T12:30:45.123456789+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:45.123456789+02:00");
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_zero_timestamp_parses() {
        assert!(Timestamp::parse_rfc3339(ZERO_TIMESTAMP).is_ok());
    }
}
