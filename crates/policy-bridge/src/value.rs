//! The policy-side value model.
//!
//! Numbers are kept as exact decimal text. They are only turned into a
//! binary float when a caller asks for one.

use rust_decimal::Decimal as RawDecimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::convert::ConvertError;
use crate::types::SET_TOKEN;

/// A number stored as validated decimal text.
#[derive(Debug, Clone)]
pub struct Number(String);

impl Number {
    /// Parses number text (JSON number grammar).
    pub fn parse(text: &str) -> Result<Self, ConvertError> {
        if is_number_literal(text) {
            Ok(Number(text.to_string()))
        } else {
            Err(ConvertError::parse("number", format!("invalid number literal {:?}", text)))
        }
    }

    /// Converts a float, rejecting NaN and infinities.
    pub fn from_f64(f: f64) -> Result<Self, ConvertError> {
        if !f.is_finite() {
            return Err(ConvertError::range("number", f.to_string()));
        }
        Ok(Number(f.to_string()))
    }

    /// Converts a decimal with trailing zeros trimmed.
    pub fn from_decimal(d: RawDecimal) -> Self {
        Number(d.normalize().to_string())
    }

    /// The exact text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as `i64` when the text is an integer in range.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// The value as `u64` when the text is a non-negative integer in range.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// The value as `f64`. Lossy for long mantissas.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|f| f.is_finite())
    }

    /// The value as an exact decimal, if it fits `rust_decimal`'s range.
    pub fn as_decimal(&self) -> Option<RawDecimal> {
        RawDecimal::from_str(&self.0)
            .or_else(|_| RawDecimal::from_scientific(&self.0))
            .ok()
    }
}

macro_rules! number_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(n: $t) -> Self {
                    Number(n.to_string())
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl FromStr for Number {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Number::parse(s)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
            return a.cmp(&b);
        }
        match (self.0.parse::<f64>(), other.0.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.total_cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

/// Checks `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`.
fn is_number_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_len = i - int_start;
    if int_len == 0 || (int_len > 1 && bytes[int_start] == b'0') {
        return false;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

/// A policy value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Exact number.
    Number(Number),
    /// Text.
    String(String),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Key-ordered mapping.
    Object(BTreeMap<String, Value>),
    /// Unique members.
    Set(BTreeSet<Value>),
}

impl Value {
    /// Name of the value's kind, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Set(_) => "set",
        }
    }

    /// Builds an object from key/value pairs. Later keys win.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a set; duplicates collapse.
    pub fn set<I: IntoIterator<Item = Value>>(members: I) -> Self {
        Value::Set(members.into_iter().collect())
    }

    /// Builds an array.
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Parses number text into a value.
    pub fn number(text: &str) -> Result<Self, ConvertError> {
        Number::parse(text).map(Value::Number)
    }

    /// Returns true for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number payload.
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Array payload.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Object payload.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Set payload.
    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(members) => Some(members),
            _ => None,
        }
    }

    /// Looks up an object key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(key))
    }

    /// Converts to JSON. Sets become arrays; numbers keep their exact text.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses JSON text.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        Ok(Value::from(parsed))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(Number(n.to_string())),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::canonical::write_canonical(f, self)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            // serde_json's arbitrary-precision number carries the exact text.
            Value::Number(n) => n
                .as_str()
                .parse::<serde_json::Number>()
                .map_err(<S::Error as serde::ser::Error>::custom)?
                .serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Set(members) => serializer.serialize_newtype_struct(SET_TOKEN, &SetMembers(members)),
        }
    }
}

struct SetMembers<'a>(&'a BTreeSet<Value>);

impl Serialize for SetMembers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_grammar() {
        for ok in ["0", "-1", "12.50", "1e10", "1.5E-3", "-0.0"] {
            assert!(Number::parse(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "-", "01", "1.", ".5", "1e", "NaN", "1_000", " 1"] {
            assert!(Number::parse(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_number_equality_is_numeric() {
        assert_eq!(Number::parse("1").unwrap(), Number::parse("1.0").unwrap());
        assert!(Number::parse("2").unwrap() > Number::parse("10e-1").unwrap());
        assert_eq!(Number::parse("1.0").unwrap().as_str(), "1.0");
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(Number::from_f64(f64::NAN).is_err());
        assert!(Number::from_f64(f64::INFINITY).is_err());
        assert_eq!(Number::from_f64(0.1).unwrap().as_str(), "0.1");
    }

    #[test]
    fn test_kind_ordering() {
        let mut values = vec![
            Value::set([Value::from(1)]),
            Value::from("a"),
            Value::Null,
            Value::from(3),
            Value::Boolean(false),
        ];
        values.sort();
        let kinds: Vec<_> = values.iter().map(Value::kind).collect();
        assert_eq!(kinds, ["null", "boolean", "number", "string", "set"]);
    }

    #[test]
    fn test_set_members_unique() {
        let set = Value::set([Value::from("a"), Value::from("a"), Value::from("b")]);
        assert_eq!(set.as_set().unwrap().len(), 2);
    }

    #[test]
    fn test_json_interop() {
        let value = Value::from(json!({"a": [1, 2.5, null], "b": true}));
        assert_eq!(value.get("b"), Some(&Value::Boolean(true)));
        assert_eq!(value.to_json().unwrap(), json!({"a": [1, 2.5, null], "b": true}));

        let set = Value::set([Value::from("x")]);
        assert_eq!(serde_json::to_value(&set).unwrap(), json!(["x"]));
    }

    #[test]
    fn test_json_numbers_keep_exact_text() {
        let value = Value::from_json_str(r#"{"f": 0.10000000000000000001, "n": -0.0}"#).unwrap();
        assert_eq!(value.get("f").unwrap().to_string(), "0.10000000000000000001");
        assert_eq!(value.get("n").unwrap().to_string(), "-0.0");

        let big = Value::number("123456789012345678901234567890").unwrap();
        let json = big.to_json().unwrap();
        assert_eq!(json.to_string(), "123456789012345678901234567890");
        assert_eq!(
            serde_json::to_string(&Value::number("1.50").unwrap()).unwrap(),
            "1.50"
        );
    }
}
