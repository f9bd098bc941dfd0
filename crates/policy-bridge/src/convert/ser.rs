//! Encoder: turns any `Serialize` type into a [`Value`].

use serde::ser::{self, Impossible, Serialize};
use std::collections::BTreeMap;

use super::error::ConvertError;
use super::ConvertOptions;
use crate::types::{Timestamp, DECIMAL_TOKEN, JSON_NUMBER_TOKEN, SET_TOKEN, TIMESTAMP_TOKEN};
use crate::value::{Number, Value};

#[derive(Clone, Copy)]
pub(crate) struct ValueSerializer<'a> {
    options: &'a ConvertOptions,
}

impl<'a> ValueSerializer<'a> {
    pub(crate) fn new(options: &'a ConvertOptions) -> Self {
        Self { options }
    }
}

fn float_value(text: String, target: &'static str, finite: bool) -> Result<Value, ConvertError> {
    if !finite {
        return Err(ConvertError::range(target, text));
    }
    Ok(Value::Number(Number::parse(&text)?))
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = Value;
    type Error = ConvertError;

    type SerializeSeq = SerializeArray<'a>;
    type SerializeTuple = SerializeArray<'a>;
    type SerializeTupleStruct = SerializeArray<'a>;
    type SerializeTupleVariant = SerializeTupleVariant<'a>;
    type SerializeMap = SerializeObject<'a>;
    type SerializeStruct = SerializeObject<'a>;
    type SerializeStructVariant = SerializeStructVariant<'a>;

    fn serialize_bool(self, v: bool) -> Result<Value, ConvertError> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, ConvertError> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, ConvertError> {
        float_value(v.to_string(), "f32", v.is_finite())
    }

    fn serialize_f64(self, v: f64) -> Result<Value, ConvertError> {
        float_value(v.to_string(), "f64", v.is_finite())
    }

    fn serialize_char(self, v: char) -> Result<Value, ConvertError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, ConvertError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, ConvertError> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, ConvertError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, ConvertError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, ConvertError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, ConvertError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, ConvertError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value, ConvertError> {
        match name {
            DECIMAL_TOKEN => match value.serialize(self)? {
                Value::String(text) => Ok(Value::Number(Number::parse(&text)?)),
                other => Err(ConvertError::type_mismatch("decimal text", other.kind())),
            },
            TIMESTAMP_TOKEN => match value.serialize(self)? {
                Value::String(text) => {
                    let ts = Timestamp::parse_rfc3339(&text)
                        .map_err(|e| ConvertError::parse("timestamp", e))?;
                    Ok(Value::String(self.options.time_format.format(&ts)))
                }
                other => Err(ConvertError::type_mismatch("timestamp text", other.kind())),
            },
            SET_TOKEN => match value.serialize(self)? {
                Value::Array(items) => Ok(Value::Set(items.into_iter().collect())),
                other => Err(ConvertError::type_mismatch("set members", other.kind())),
            },
            _ => value.serialize(self),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, ConvertError> {
        let inner = value.serialize(self).map_err(|e| e.at_key(variant))?;
        Ok(Value::object([(variant, inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeArray<'a>, ConvertError> {
        Ok(SerializeArray {
            items: Vec::with_capacity(len.unwrap_or(0)),
            options: self.options,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeArray<'a>, ConvertError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeArray<'a>, ConvertError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant<'a>, ConvertError> {
        Ok(SerializeTupleVariant {
            variant,
            array: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeObject<'a>, ConvertError> {
        Ok(SerializeObject::new(self.options, Shape::Map { presence: true }))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<SerializeObject<'a>, ConvertError> {
        let shape = if name == JSON_NUMBER_TOKEN {
            Shape::JsonNumber
        } else {
            Shape::Struct
        };
        Ok(SerializeObject::new(self.options, shape))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant<'a>, ConvertError> {
        Ok(SerializeStructVariant {
            variant,
            object: SerializeObject::new(self.options, Shape::Struct),
        })
    }
}

pub(crate) struct SerializeArray<'a> {
    items: Vec<Value>,
    options: &'a ConvertOptions,
}

impl SerializeArray<'_> {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        let index = self.items.len();
        let item = value
            .serialize(ValueSerializer::new(self.options))
            .map_err(|e| e.at_index(index))?;
        self.items.push(item);
        Ok(())
    }
}

impl ser::SerializeSeq for SerializeArray<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ConvertError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeArray<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ConvertError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SerializeArray<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ConvertError> {
        Ok(Value::Array(self.items))
    }
}

pub(crate) struct SerializeTupleVariant<'a> {
    variant: &'static str,
    array: SerializeArray<'a>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        self.array.push(value).map_err(|e| e.at_key(self.variant))
    }

    fn end(self) -> Result<Value, ConvertError> {
        Ok(Value::object([(self.variant, Value::Array(self.array.items))]))
    }
}

/// Builds objects for maps and structs.
///
/// A map whose values are all unit structs becomes a set of its keys, which
/// is how presence-only maps such as `HashMap<String, Present>` are written.
pub(crate) struct SerializeObject<'a> {
    entries: BTreeMap<String, Value>,
    next_key: Option<String>,
    shape: Shape,
    options: &'a ConvertOptions,
}

#[derive(Clone, Copy)]
enum Shape {
    Struct,
    /// `presence`: every value so far was a unit struct.
    Map { presence: bool },
    /// A `serde_json::Number` holding its exact text in one field.
    JsonNumber,
}

impl<'a> SerializeObject<'a> {
    fn new(options: &'a ConvertOptions, shape: Shape) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_key: None,
            shape,
            options,
        }
    }

    fn insert<T: ?Sized + Serialize>(&mut self, key: String, value: &T) -> Result<(), ConvertError> {
        if let Shape::Map { presence } = &mut self.shape {
            *presence &= value.serialize(UnitStructOnly).is_ok();
        }
        let item = value
            .serialize(ValueSerializer::new(self.options))
            .map_err(|e| e.at_key(&key))?;
        self.entries.insert(key, item);
        Ok(())
    }

    fn finish(mut self) -> Result<Value, ConvertError> {
        match self.shape {
            Shape::Map { presence: true } if !self.entries.is_empty() => Ok(Value::Set(
                self.entries.into_keys().map(Value::String).collect(),
            )),
            Shape::JsonNumber => match self.entries.remove(JSON_NUMBER_TOKEN) {
                Some(Value::String(text)) => Ok(Value::Number(Number::parse(&text)?)),
                other => Err(ConvertError::type_mismatch(
                    "number text",
                    other.as_ref().map_or("nothing", Value::kind),
                )),
            },
            _ => Ok(Value::Object(self.entries)),
        }
    }
}

impl ser::SerializeMap for SerializeObject<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ConvertError> {
        self.next_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ConvertError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| ser::Error::custom("map value serialized before its key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, ConvertError> {
        self.finish()
    }
}

impl ser::SerializeStruct for SerializeObject<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ConvertError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, ConvertError> {
        self.finish()
    }
}

pub(crate) struct SerializeStructVariant<'a> {
    variant: &'static str,
    object: SerializeObject<'a>,
}

impl ser::SerializeStructVariant for SerializeStructVariant<'_> {
    type Ok = Value;
    type Error = ConvertError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ConvertError> {
        self.object
            .insert(key.to_string(), value)
            .map_err(|e| e.at_key(self.variant))
    }

    fn end(self) -> Result<Value, ConvertError> {
        let inner = self.object.finish().map_err(|e| e.at_key(self.variant))?;
        Ok(Value::object([(self.variant, inner)]))
    }
}

fn key_error(found: &str) -> ConvertError {
    ConvertError::key_type(format!("{} key", found))
}

/// Serializes map keys. Only string-like keys are accepted.
struct MapKeySerializer;

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = ConvertError;

    type SerializeSeq = Impossible<String, ConvertError>;
    type SerializeTuple = Impossible<String, ConvertError>;
    type SerializeTupleStruct = Impossible<String, ConvertError>;
    type SerializeTupleVariant = Impossible<String, ConvertError>;
    type SerializeMap = Impossible<String, ConvertError>;
    type SerializeStruct = Impossible<String, ConvertError>;
    type SerializeStructVariant = Impossible<String, ConvertError>;

    fn serialize_bool(self, _v: bool) -> Result<String, ConvertError> {
        Err(key_error("bool"))
    }

    fn serialize_i8(self, _v: i8) -> Result<String, ConvertError> {
        Err(key_error("i8"))
    }

    fn serialize_i16(self, _v: i16) -> Result<String, ConvertError> {
        Err(key_error("i16"))
    }

    fn serialize_i32(self, _v: i32) -> Result<String, ConvertError> {
        Err(key_error("i32"))
    }

    fn serialize_i64(self, _v: i64) -> Result<String, ConvertError> {
        Err(key_error("i64"))
    }

    fn serialize_i128(self, _v: i128) -> Result<String, ConvertError> {
        Err(key_error("i128"))
    }

    fn serialize_u8(self, _v: u8) -> Result<String, ConvertError> {
        Err(key_error("u8"))
    }

    fn serialize_u16(self, _v: u16) -> Result<String, ConvertError> {
        Err(key_error("u16"))
    }

    fn serialize_u32(self, _v: u32) -> Result<String, ConvertError> {
        Err(key_error("u32"))
    }

    fn serialize_u64(self, _v: u64) -> Result<String, ConvertError> {
        Err(key_error("u64"))
    }

    fn serialize_u128(self, _v: u128) -> Result<String, ConvertError> {
        Err(key_error("u128"))
    }

    fn serialize_f32(self, _v: f32) -> Result<String, ConvertError> {
        Err(key_error("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<String, ConvertError> {
        Err(key_error("f64"))
    }

    fn serialize_char(self, v: char) -> Result<String, ConvertError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, ConvertError> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, ConvertError> {
        Err(key_error("bytes"))
    }

    fn serialize_none(self) -> Result<String, ConvertError> {
        Err(key_error("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<String, ConvertError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, ConvertError> {
        Err(key_error("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<String, ConvertError> {
        Err(key_error(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, ConvertError> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, ConvertError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, ConvertError> {
        Err(key_error(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ConvertError> {
        Err(key_error("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ConvertError> {
        Err(key_error("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, ConvertError> {
        Err(key_error(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, ConvertError> {
        Err(key_error(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ConvertError> {
        Err(key_error("map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, ConvertError> {
        Err(key_error(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, ConvertError> {
        Err(key_error(name))
    }
}

/// Succeeds only for unit structs. Plain `()` is rejected since a
/// `serde_json::Value::Null` writes itself the same way.
struct UnitStructOnly;

fn not_unit() -> ConvertError {
    ConvertError::unsupported("not a unit struct")
}

impl ser::Serializer for UnitStructOnly {
    type Ok = ();
    type Error = ConvertError;

    type SerializeSeq = Impossible<(), ConvertError>;
    type SerializeTuple = Impossible<(), ConvertError>;
    type SerializeTupleStruct = Impossible<(), ConvertError>;
    type SerializeTupleVariant = Impossible<(), ConvertError>;
    type SerializeMap = Impossible<(), ConvertError>;
    type SerializeStruct = Impossible<(), ConvertError>;
    type SerializeStructVariant = Impossible<(), ConvertError>;

    fn serialize_unit(self) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), ConvertError> {
        Ok(())
    }

    fn serialize_bool(self, _v: bool) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_i8(self, _v: i8) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_i16(self, _v: i16) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_i32(self, _v: i32) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_i64(self, _v: i64) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_u8(self, _v: u8) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_u16(self, _v: u16) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_u32(self, _v: u32) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_u64(self, _v: u64) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_f32(self, _v: f32) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_f64(self, _v: f64) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_char(self, _v: char) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_str(self, _v: &str) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_none(self) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _value: &T,
    ) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), ConvertError> {
        Err(not_unit())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ConvertError> {
        Err(not_unit())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ConvertError> {
        Err(not_unit())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, ConvertError> {
        Err(not_unit())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, ConvertError> {
        Err(not_unit())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ConvertError> {
        Err(not_unit())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, ConvertError> {
        Err(not_unit())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, ConvertError> {
        Err(not_unit())
    }
}
