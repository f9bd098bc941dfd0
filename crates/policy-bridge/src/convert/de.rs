//! Decoder: drives a type's `Deserialize` impl from a [`Value`].

use serde::de::value::StrDeserializer;
use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use std::collections::{btree_map, btree_set, BTreeMap};

use super::error::{ConvertError, ConvertErrorKind};
use super::ConvertOptions;
use crate::types::{DECIMAL_TOKEN, SET_TOKEN, TIMESTAMP_TOKEN, ZERO_TIMESTAMP};
use crate::value::Value;

pub(crate) struct ValueDeserializer<'de> {
    value: &'de Value,
    options: &'de ConvertOptions,
}

impl<'de> ValueDeserializer<'de> {
    pub(crate) fn new(value: &'de Value, options: &'de ConvertOptions) -> Self {
        Self { value, options }
    }

    /// Error for a value that does not fit `expected`; `null` gets its own kind.
    fn mismatch(&self, expected: impl Into<String>) -> ConvertError {
        match self.value {
            Value::Null => ConvertError::null_not_allowed(expected),
            other => ConvertError::type_mismatch(expected, other.kind()),
        }
    }
}

/// Parses integer text into the exact target width.
fn parse_integer<T>(text: &str, target: &'static str) -> Result<T, ConvertError>
where
    T: TryFrom<i128> + TryFrom<u128>,
{
    if let Ok(wide) = text.parse::<i128>() {
        return T::try_from(wide).map_err(|_| ConvertError::range(target, text));
    }
    if let Ok(wide) = text.parse::<u128>() {
        return T::try_from(wide).map_err(|_| ConvertError::range(target, text));
    }
    if text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        return Err(ConvertError::range(target, text));
    }
    Err(ConvertError::type_mismatch(
        target,
        format!("non-integer number {}", text),
    ))
}

fn parse_f64(text: &str) -> Result<f64, ConvertError> {
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| ConvertError::range("f64", text))
}

fn visit_array<'de, V: Visitor<'de>>(
    items: &'de [Value],
    options: &'de ConvertOptions,
    visitor: V,
) -> Result<V::Value, ConvertError> {
    let mut access = ArrayAccess::new(items, options, 0);
    let out = visitor.visit_seq(&mut access)?;
    let left = access.iter.len();
    if left == 0 {
        Ok(out)
    } else {
        Err(ConvertError::new(ConvertErrorKind::LengthMismatch {
            capacity: items.len() - left,
            len: items.len(),
        }))
    }
}

macro_rules! deserialize_integer {
    ($($method:ident => $visit:ident($t:ty)),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
                match self.value {
                    Value::Number(n) => {
                        visitor.$visit(parse_integer::<$t>(n.as_str(), stringify!($t))?)
                    }
                    _ => Err(self.mismatch(stringify!($t))),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ValueDeserializer<'de> {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Boolean(b) => visitor.visit_bool(*b),
            Value::Number(n) => visitor.visit_f64(parse_f64(n.as_str())?),
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Array(items) => visit_array(items, self.options, visitor),
            Value::Object(entries) => visitor.visit_map(ObjectAccess::new(entries, self.options)),
            Value::Set(_) => Err(ConvertError::unsupported(
                "set into a dynamic target; decode into StringSet or a presence-only map",
            )),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Boolean(b) => visitor.visit_bool(*b),
            _ => Err(self.mismatch("bool")),
        }
    }

    deserialize_integer! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Number(n) => {
                let wide = parse_f64(n.as_str())?;
                let narrow = wide as f32;
                if narrow.is_infinite() {
                    return Err(ConvertError::range("f32", n.as_str()));
                }
                visitor.visit_f32(narrow)
            }
            _ => Err(self.mismatch("f32")),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Number(n) => visitor.visit_f64(parse_f64(n.as_str())?),
            _ => Err(self.mismatch("f64")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => visitor.visit_char(c),
                    _ => Err(ConvertError::type_mismatch(
                        "a single character",
                        format!("string of {} characters", s.chars().count()),
                    )),
                }
            }
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::String(s) => visitor.visit_borrowed_str(s),
            _ => Err(self.mismatch("string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::String(s) => visitor.visit_borrowed_bytes(s.as_bytes()),
            Value::Array(items) => visit_array(items, self.options, visitor),
            _ => Err(self.mismatch("bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    /// Unit carries no information, so any value is accepted and dropped.
    /// This is what lets an object's values be ignored for presence-only maps.
    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match name {
            DECIMAL_TOKEN => match self.value {
                Value::Number(n) => visitor.visit_str(n.as_str()),
                _ => Err(self.mismatch("a decimal number")),
            },
            TIMESTAMP_TOKEN => match self.value {
                Value::String(s) => {
                    let ts = self.options.time_format.parse(s)?;
                    visitor.visit_string(ts.to_rfc3339())
                }
                _ => Err(self.mismatch("a timestamp string")),
            },
            SET_TOKEN => match self.value {
                Value::Set(members) => visitor.visit_seq(MemberAccess::new(Members::Set(members.iter()))),
                Value::Object(entries) => {
                    visitor.visit_seq(MemberAccess::new(Members::Keys(entries.keys())))
                }
                Value::Null => visitor.visit_seq(EmptyAccess),
                _ => Err(self.mismatch("a set or object")),
            },
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Array(items) => visit_array(items, self.options, visitor),
            Value::Null => visitor.visit_seq(EmptyAccess),
            _ => Err(self.mismatch("an array")),
        }
    }

    /// Fixed-size targets: longer arrays fail, shorter ones are padded with
    /// zero values.
    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Array(items) => {
                if items.len() > len {
                    return Err(ConvertError::new(ConvertErrorKind::LengthMismatch {
                        capacity: len,
                        len: items.len(),
                    }));
                }
                let mut access = ArrayAccess::new(items, self.options, len - items.len());
                visitor.visit_seq(&mut access)
            }
            _ => Err(self.mismatch(format!("an array of at most {} elements", len))),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Object(entries) => visitor.visit_map(ObjectAccess::new(entries, self.options)),
            Value::Set(members) => visitor.visit_map(SetAsMapAccess {
                members: MemberAccess::new(Members::Set(members.iter())),
            }),
            Value::Null => visitor.visit_map(EmptyAccess),
            _ => Err(self.mismatch("an object")),
        }
    }

    /// Fields missing from the object are decoded from their zero values.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::Object(entries) => {
                let access = ObjectAccess::new(entries, self.options).with_missing(fields);
                visitor.visit_map(access)
            }
            _ => Err(self.mismatch(format!("an object for struct {}", name))),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match self.value {
            Value::String(s) => visitor.visit_enum(StrDeserializer::<ConvertError>::new(s)),
            Value::Object(entries) if entries.len() == 1 => match entries.iter().next() {
                Some((variant, value)) => visitor.visit_enum(EnumObjectAccess {
                    variant: variant.as_str(),
                    value,
                    options: self.options,
                }),
                None => Err(self.mismatch(format!("a variant of enum {}", name))),
            },
            _ => Err(self.mismatch(format!(
                "a string or single-key object for enum {}",
                name
            ))),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }
}

struct ArrayAccess<'de> {
    iter: std::slice::Iter<'de, Value>,
    options: &'de ConvertOptions,
    index: usize,
    padding: usize,
}

impl<'de> ArrayAccess<'de> {
    fn new(items: &'de [Value], options: &'de ConvertOptions, padding: usize) -> Self {
        Self {
            iter: items.iter(),
            options,
            index: 0,
            padding,
        }
    }
}

impl<'de> SeqAccess<'de> for ArrayAccess<'de> {
    type Error = ConvertError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ConvertError> {
        let index = self.index;
        let decoded = match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value, self.options)),
            None if self.padding > 0 => {
                self.padding -= 1;
                seed.deserialize(ZeroDeserializer)
            }
            None => return Ok(None),
        };
        self.index += 1;
        decoded.map(Some).map_err(|e| e.at_index(index))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len() + self.padding)
    }
}

struct ObjectAccess<'de> {
    entries: &'de BTreeMap<String, Value>,
    iter: btree_map::Iter<'de, String, Value>,
    pending: Option<Pending<'de>>,
    /// Struct fields not present in `entries`, visited after them.
    missing: Vec<&'static str>,
    options: &'de ConvertOptions,
}

enum Pending<'de> {
    Entry(&'de str, &'de Value),
    Zero(&'static str),
}

impl<'de> ObjectAccess<'de> {
    fn new(entries: &'de BTreeMap<String, Value>, options: &'de ConvertOptions) -> Self {
        Self {
            entries,
            iter: entries.iter(),
            pending: None,
            missing: Vec::new(),
            options,
        }
    }

    fn with_missing(mut self, fields: &'static [&'static str]) -> Self {
        self.missing = fields
            .iter()
            .rev()
            .copied()
            .filter(|field| !self.entries.contains_key(*field))
            .collect();
        self
    }
}

impl<'de> MapAccess<'de> for ObjectAccess<'de> {
    type Error = ConvertError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ConvertError> {
        let key = match self.iter.next() {
            Some((key, value)) => {
                let key = key.as_str();
                self.pending = Some(Pending::Entry(key, value));
                key
            }
            None => match self.missing.pop() {
                Some(field) => {
                    self.pending = Some(Pending::Zero(field));
                    field
                }
                None => return Ok(None),
            },
        };
        seed.deserialize(KeyDeserializer { key })
            .map(Some)
            .map_err(|e| e.at_key(key))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, ConvertError> {
        match self.pending.take() {
            Some(Pending::Entry(key, value)) => seed
                .deserialize(ValueDeserializer::new(value, self.options))
                .map_err(|e| e.at_key(key)),
            Some(Pending::Zero(field)) => seed
                .deserialize(ZeroDeserializer)
                .map_err(|e| e.at_key(field)),
            None => Err(de::Error::custom("map value requested before its key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len() + self.missing.len())
    }
}

enum Members<'de> {
    Set(btree_set::Iter<'de, Value>),
    Keys(btree_map::Keys<'de, String, Value>),
}

/// String members of a set or the keys of an object.
struct MemberAccess<'de> {
    members: Members<'de>,
    index: usize,
}

impl<'de> MemberAccess<'de> {
    fn new(members: Members<'de>) -> Self {
        Self { members, index: 0 }
    }

    fn next_member(&mut self) -> Option<Result<&'de str, ConvertError>> {
        let index = self.index;
        self.index += 1;
        match &mut self.members {
            Members::Keys(keys) => keys.next().map(|k| Ok(k.as_str())),
            Members::Set(values) => values.next().map(|v| match v {
                Value::String(s) => Ok(s.as_str()),
                other => Err(ConvertError::key_type(other.kind()).at_index(index)),
            }),
        }
    }

    fn remaining(&self) -> usize {
        match &self.members {
            Members::Keys(keys) => keys.len(),
            Members::Set(values) => values.len(),
        }
    }
}

impl<'de> SeqAccess<'de> for MemberAccess<'de> {
    type Error = ConvertError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ConvertError> {
        match self.next_member() {
            Some(member) => {
                let key = member?;
                seed.deserialize(KeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining())
    }
}

/// A set read as a map: members become keys, every value is unit.
struct SetAsMapAccess<'de> {
    members: MemberAccess<'de>,
}

impl<'de> MapAccess<'de> for SetAsMapAccess<'de> {
    type Error = ConvertError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ConvertError> {
        match self.members.next_member() {
            Some(member) => {
                let key = member?;
                seed.deserialize(KeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, ConvertError> {
        seed.deserialize(PresenceDeserializer)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.members.remaining())
    }
}

struct EmptyAccess;

impl<'de> SeqAccess<'de> for EmptyAccess {
    type Error = ConvertError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        _seed: T,
    ) -> Result<Option<T::Value>, ConvertError> {
        Ok(None)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(0)
    }
}

impl<'de> MapAccess<'de> for EmptyAccess {
    type Error = ConvertError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        _seed: K,
    ) -> Result<Option<K::Value>, ConvertError> {
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        _seed: V,
    ) -> Result<V::Value, ConvertError> {
        Err(de::Error::custom("empty map has no values"))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(0)
    }
}

struct EnumObjectAccess<'de> {
    variant: &'de str,
    value: &'de Value,
    options: &'de ConvertOptions,
}

impl<'de> EnumAccess<'de> for EnumObjectAccess<'de> {
    type Error = ConvertError;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self), ConvertError> {
        let variant = seed.deserialize(KeyDeserializer { key: self.variant })?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for EnumObjectAccess<'de> {
    type Error = ConvertError;

    fn unit_variant(self) -> Result<(), ConvertError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, ConvertError> {
        seed.deserialize(ValueDeserializer::new(self.value, self.options))
            .map_err(|e| e.at_key(self.variant))
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        ValueDeserializer::new(self.value, self.options)
            .deserialize_tuple(len, visitor)
            .map_err(|e| e.at_key(self.variant))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        ValueDeserializer::new(self.value, self.options)
            .deserialize_struct("variant", fields, visitor)
            .map_err(|e| e.at_key(self.variant))
    }
}

/// Map keys. Host maps are string-keyed; any other key type is rejected.
struct KeyDeserializer<'de> {
    key: &'de str,
}

macro_rules! reject_key {
    ($($method:ident => $what:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ConvertError> {
                Err(ConvertError::key_type(concat!($what, " key")))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for KeyDeserializer<'de> {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str(self.key)
    }

    reject_key! {
        deserialize_bool => "bool",
        deserialize_i8 => "i8",
        deserialize_i16 => "i16",
        deserialize_i32 => "i32",
        deserialize_i64 => "i64",
        deserialize_i128 => "i128",
        deserialize_u8 => "u8",
        deserialize_u16 => "u16",
        deserialize_u32 => "u32",
        deserialize_u64 => "u64",
        deserialize_u128 => "u128",
        deserialize_f32 => "f32",
        deserialize_f64 => "f64",
        deserialize_unit => "unit",
        deserialize_seq => "sequence",
        deserialize_map => "map",
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(ConvertError::type_mismatch("a single character", "longer key")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str(self.key)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str(self.key)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_bytes(self.key.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_bytes(self.key.as_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_some(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, ConvertError> {
        Err(ConvertError::key_type("unit struct key"))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ConvertError> {
        Err(ConvertError::key_type("tuple key"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ConvertError> {
        Err(ConvertError::key_type("tuple struct key"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ConvertError> {
        Err(ConvertError::key_type("struct key"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_enum(StrDeserializer::<ConvertError>::new(self.key))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str(self.key)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }
}

/// Value slot of a set read as a map. Only unit-like targets fit.
struct PresenceDeserializer;

impl<'de> Deserializer<'de> for PresenceDeserializer {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, ConvertError> {
        Err(ConvertError::type_mismatch(
            "an object (sets only convert to presence-only maps)",
            "set",
        ))
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option newtype_struct seq tuple tuple_struct map struct
        enum identifier
    }
}

/// Produces the zero value of whatever shape is requested. Used to fill
/// fixed-size targets from shorter arrays and struct fields an object lacks.
struct ZeroDeserializer;

impl<'de> Deserializer<'de> for ZeroDeserializer {
    type Error = ConvertError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_bool(false)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_i8(0)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_i16(0)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_i32(0)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_i64(0)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_i128(0)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_u8(0)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_u16(0)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_u32(0)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_u64(0)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_u128(0)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_f32(0.0)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_f64(0.0)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_char('\0')
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str("")
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_bytes(&[])
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_bytes(&[])
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match name {
            DECIMAL_TOKEN => visitor.visit_borrowed_str("0"),
            TIMESTAMP_TOKEN => visitor.visit_borrowed_str(ZERO_TIMESTAMP),
            SET_TOKEN => visitor.visit_seq(EmptyAccess),
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_seq(EmptyAccess)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_seq(ZeroSeq { remaining: len })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_seq(ZeroSeq { remaining: len })
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_map(EmptyAccess)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_map(ZeroFields {
            fields: fields.iter(),
        })
    }

    /// The zero of an enum is its first variant.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        match variants.first() {
            Some(variant) => visitor.visit_enum(ZeroVariant { variant: *variant }),
            None => Err(ConvertError::unsupported(format!(
                "enum {} has no variants",
                name
            ))),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_borrowed_str("")
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_unit()
    }
}

struct ZeroSeq {
    remaining: usize,
}

impl<'de> SeqAccess<'de> for ZeroSeq {
    type Error = ConvertError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ConvertError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(ZeroDeserializer).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Every field of a struct, each with its zero value.
struct ZeroFields {
    fields: std::slice::Iter<'static, &'static str>,
}

impl<'de> MapAccess<'de> for ZeroFields {
    type Error = ConvertError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ConvertError> {
        match self.fields.next() {
            Some(field) => seed.deserialize(KeyDeserializer { key: *field }).map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, ConvertError> {
        seed.deserialize(ZeroDeserializer)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

struct ZeroVariant {
    variant: &'static str,
}

impl<'de> EnumAccess<'de> for ZeroVariant {
    type Error = ConvertError;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self), ConvertError> {
        let variant = seed.deserialize(KeyDeserializer { key: self.variant })?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for ZeroVariant {
    type Error = ConvertError;

    fn unit_variant(self) -> Result<(), ConvertError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, ConvertError> {
        seed.deserialize(ZeroDeserializer)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, ConvertError> {
        visitor.visit_seq(ZeroSeq { remaining: len })
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConvertError> {
        visitor.visit_map(ZeroFields {
            fields: fields.iter(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::{decode, decode_with, ConvertErrorKind, ConvertOptions, TimeFormat};
    use crate::types::{Decimal, StringSet, Timestamp};
    use crate::value::Value;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Person {
        name: String,
        #[serde(rename = "years")]
        age: u8,
        nickname: Option<String>,
        #[serde(skip)]
        cache: Vec<u8>,
    }

    #[test]
    fn test_decode_scalars() {
        assert!(decode::<bool>(&v(json!(true))).unwrap());
        assert_eq!(decode::<String>(&v(json!("hi"))).unwrap(), "hi");
        assert_eq!(decode::<i64>(&v(json!(-42))).unwrap(), -42);
        assert_eq!(decode::<u16>(&v(json!(65535))).unwrap(), 65535);
        assert_eq!(decode::<f64>(&v(json!(2.5))).unwrap(), 2.5);
        assert_eq!(decode::<char>(&v(json!("x"))).unwrap(), 'x');
    }

    #[test]
    fn test_decode_integer_range() {
        let err = decode::<i8>(&Value::number("300").unwrap()).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Range { target, .. } if target == "i8"));
        assert_eq!(decode::<i8>(&Value::number("100").unwrap()).unwrap(), 100);
        assert_eq!(decode::<i8>(&Value::number("-128").unwrap()).unwrap(), -128);

        let err = decode::<u32>(&Value::number("-1").unwrap()).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Range { .. }));

        let err = decode::<i64>(&Value::number("1.5").unwrap()).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::TypeMismatch { .. }));

        let huge = "123456789012345678901234567890123456789012";
        let err = decode::<u64>(&Value::number(huge).unwrap()).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Range { .. }));
    }

    #[test]
    fn test_decode_f32_overflow() {
        let err = decode::<f32>(&Value::number("1e300").unwrap()).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Range { target, .. } if target == "f32"));
    }

    #[test]
    fn test_decode_type_mismatch() {
        let err = decode::<i32>(&v(json!("12"))).unwrap_err();
        assert_eq!(
            err.kind(),
            &ConvertErrorKind::TypeMismatch {
                expected: "i32".to_string(),
                found: "string".to_string()
            }
        );
        assert!(decode::<bool>(&v(json!(1))).is_err());
        assert!(decode::<String>(&v(json!(true))).is_err());
    }

    #[test]
    fn test_decode_null_handling() {
        assert_eq!(decode::<Option<i32>>(&Value::Null).unwrap(), None);
        assert_eq!(decode::<Option<i32>>(&v(json!(5))).unwrap(), Some(5));
        assert_eq!(decode::<Vec<String>>(&Value::Null).unwrap(), Vec::<String>::new());
        assert!(decode::<HashMap<String, i32>>(&Value::Null).unwrap().is_empty());

        let err = decode::<i32>(&Value::Null).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::NullNotAllowed { .. }));
        let err = decode::<Person>(&Value::Null).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::NullNotAllowed { .. }));
    }

    #[test]
    fn test_decode_struct_partial_and_extra_keys() {
        let person: Person = decode(&v(json!({"name": "ann", "extra": [1, 2]}))).unwrap();
        assert_eq!(
            person,
            Person {
                name: "ann".to_string(),
                ..Person::default()
            }
        );

        let person: Person = decode(&v(json!({"name": "bo", "years": 40, "age": 99}))).unwrap();
        assert_eq!(person.age, 40);
        assert!(person.cache.is_empty());
    }

    #[test]
    fn test_decode_missing_fields_take_zero_values() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Plain {
            name: String,
            age: u8,
        }
        let plain: Plain = decode(&v(json!({"name": "ann"}))).unwrap();
        assert_eq!(
            plain,
            Plain {
                name: "ann".to_string(),
                age: 0
            }
        );

        #[derive(Debug, Deserialize, PartialEq)]
        enum Level {
            Low,
            High,
        }
        #[derive(Debug, Deserialize)]
        struct Account {
            owner: Plain,
            level: Level,
            tags: Vec<String>,
            opened: Timestamp,
            balance: Decimal,
            limits: [u16; 2],
        }
        let account: Account = decode(&v(json!({"level": "High"}))).unwrap();
        assert_eq!(account.owner.name, "");
        assert_eq!(account.level, Level::High);
        assert!(account.tags.is_empty());
        assert_eq!(account.opened.to_rfc3339(), "0001-01-01T00:00:00Z");
        assert_eq!(account.balance, Decimal::from(0));
        assert_eq!(account.limits, [0, 0]);

        let account: Account = decode(&v(json!({}))).unwrap();
        assert_eq!(account.level, Level::Low);

        let err = decode::<Plain>(&v(json!({"age": "old"}))).unwrap_err();
        assert_eq!(err.path(), &[super::super::PathSegment::Key("age".to_string())]);
    }

    #[test]
    fn test_decode_struct_field_error_path() {
        let err = decode::<Person>(&v(json!({"name": "x", "years": 1000}))).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Range { .. }));
        assert_eq!(err.to_string(), "at .years: number 1000 is out of range for u8");
    }

    #[test]
    fn test_decode_nested_path() {
        #[derive(Debug, Deserialize)]
        struct Team {
            #[allow(dead_code)]
            members: Vec<Person>,
        }
        let err = decode::<Team>(&v(json!({"members": [{"name": "a"}, {"name": 7}]}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "at .members[1].name: expected string, found number"
        );
    }

    #[test]
    fn test_decode_fixed_arrays() {
        let arr: [i32; 3] = decode(&v(json!([1, 2]))).unwrap();
        assert_eq!(arr, [1, 2, 0]);

        let err = decode::<[i32; 2]>(&v(json!([1, 2, 3]))).unwrap_err();
        assert_eq!(
            err.kind(),
            &ConvertErrorKind::LengthMismatch { capacity: 2, len: 3 }
        );

        let pair: (String, bool) = decode(&v(json!(["a", true]))).unwrap();
        assert_eq!(pair, ("a".to_string(), true));
    }

    #[test]
    fn test_decode_array_element_error_is_first() {
        let err = decode::<Vec<u8>>(&v(json!([1, "two", "three"]))).unwrap_err();
        assert_eq!(err.path(), &[super::super::PathSegment::Index(1)]);
    }

    #[test]
    fn test_decode_set_into_vec_is_mismatch() {
        let set = Value::set([Value::from("a")]);
        let err = decode::<Vec<String>>(&set).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_decode_maps() {
        let m: BTreeMap<String, i32> = decode(&v(json!({"a": 1, "b": 2}))).unwrap();
        assert_eq!(m["b"], 2);

        let err = decode::<HashMap<i32, i32>>(&v(json!({"1": 1}))).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::KeyType { .. }));

        let err = decode::<HashMap<String, i32>>(&v(json!({"a": "x"}))).unwrap_err();
        assert_eq!(err.path(), &[super::super::PathSegment::Key("a".to_string())]);
    }

    #[test]
    fn test_decode_presence_maps_from_set_and_object() {
        let set = Value::set([Value::from("foo"), Value::from("bar")]);
        let from_set: HashMap<String, ()> = decode(&set).unwrap();
        assert_eq!(from_set.len(), 2);
        assert!(from_set.contains_key("foo"));

        let from_object: HashMap<String, ()> = decode(&v(json!({"foo": true, "bar": 1}))).unwrap();
        assert_eq!(from_object.len(), 2);

        let err = decode::<HashMap<String, bool>>(&set).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::TypeMismatch { .. }));

        let mixed = Value::set([Value::from("a"), Value::from(1)]);
        let err = decode::<HashMap<String, ()>>(&mixed).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::KeyType { .. }));
    }

    #[test]
    fn test_decode_string_set() {
        let set = Value::set([Value::from("x"), Value::from("y")]);
        let decoded: StringSet = decode(&set).unwrap();
        assert!(decoded.contains("x") && decoded.contains("y"));

        let from_object: StringSet = decode(&v(json!({"k": null}))).unwrap();
        assert!(from_object.contains("k"));

        assert!(decode::<StringSet>(&Value::Null).unwrap().is_empty());
        assert!(decode::<StringSet>(&v(json!(["x"]))).is_err());
    }

    #[test]
    fn test_decode_dynamic_target() {
        let dynamic: serde_json::Value =
            decode(&v(json!({"a": [1, "b", null, true]}))).unwrap();
        assert_eq!(dynamic, json!({"a": [1.0, "b", null, true]}));

        let err = decode::<serde_json::Value>(&Value::set([])).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Unsupported(_)));
    }

    #[test]
    fn test_decode_dynamic_number_is_lossy() {
        let exact = Value::number("0.1000000000000000055511151231257827").unwrap();
        let dynamic: serde_json::Value = decode(&exact).unwrap();
        assert_eq!(dynamic, json!(0.1));
    }

    #[test]
    fn test_decode_decimal() {
        let d: Decimal = decode(&Value::number("123.4500000").unwrap()).unwrap();
        assert_eq!(d, "123.45".parse().unwrap());

        let err = decode::<Decimal>(&v(json!("1.5"))).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::TypeMismatch { .. }));
        let err = decode::<Decimal>(&Value::Null).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::NullNotAllowed { .. }));

        assert_eq!(decode::<Option<Decimal>>(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_timestamp() {
        let ts: Timestamp = decode(&v(json!("2023-10-01T08:09:10.000000001Z"))).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-10-01T08:09:10.000000001Z");

        let err = decode::<Timestamp>(&v(json!("yesterday"))).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::Parse { .. }));
        let err = decode::<Timestamp>(&Value::Null).unwrap_err();
        assert!(matches!(err.kind(), ConvertErrorKind::NullNotAllowed { .. }));
        assert_eq!(decode::<Option<Timestamp>>(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_timestamp_custom_format() {
        let options = ConvertOptions::new()
            .with_time_format(TimeFormat::Custom("%Y/%m/%d %H:%M:%S %z".to_string()));
        let ts: Timestamp = decode_with(&v(json!("2023/10/01 08:09:10 +0000")), &options).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-10-01T08:09:10Z");
    }

    #[test]
    fn test_decode_enums() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Effect {
            Allow,
            Limit(u32),
        }
        assert_eq!(decode::<Effect>(&v(json!("allow"))).unwrap(), Effect::Allow);
        assert_eq!(decode::<Effect>(&v(json!({"limit": 3}))).unwrap(), Effect::Limit(3));
        assert!(decode::<Effect>(&v(json!({"limit": 3, "allow": null}))).is_err());
    }
}
