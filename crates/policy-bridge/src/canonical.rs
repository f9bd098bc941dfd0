//! Canonical policy-literal text for values.
//!
//! The rendering is deterministic:
//! - Object keys in lexicographic order
//! - Set members in value order, the empty set as `set()`
//! - No insignificant whitespace
//! - Numbers exactly as stored

use std::fmt::Write;

use crate::value::Value;

/// Renders a value as canonical policy-literal text.
pub fn to_canonical_string(value: &Value) -> String {
    value.to_string()
}

/// Writes the canonical form of a value.
pub fn write_canonical<W: Write>(writer: &mut W, value: &Value) -> std::fmt::Result {
    match value {
        Value::Null => writer.write_str("null"),
        Value::Boolean(true) => writer.write_str("true"),
        Value::Boolean(false) => writer.write_str("false"),
        Value::Number(n) => writer.write_str(n.as_str()),
        Value::String(s) => write_escaped_string(writer, s),
        Value::Array(items) => {
            writer.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writer.write_char(',')?;
                }
                write_canonical(writer, item)?;
            }
            writer.write_char(']')
        }
        Value::Object(entries) => {
            writer.write_char('{')?;
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    writer.write_char(',')?;
                }
                write_escaped_string(writer, key)?;
                writer.write_char(':')?;
                write_canonical(writer, item)?;
            }
            writer.write_char('}')
        }
        Value::Set(members) if members.is_empty() => writer.write_str("set()"),
        Value::Set(members) => {
            writer.write_char('{')?;
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    writer.write_char(',')?;
                }
                write_canonical(writer, member)?;
            }
            writer.write_char('}')
        }
    }
}

/// Writes a quoted, escaped string.
fn write_escaped_string<W: Write>(writer: &mut W, s: &str) -> std::fmt::Result {
    writer.write_char('"')?;

    for c in s.chars() {
        match c {
            '"' => writer.write_str("\\\"")?,
            '\\' => writer.write_str("\\\\")?,
            '\n' => writer.write_str("\\n")?,
            '\r' => writer.write_str("\\r")?,
            '\t' => writer.write_str("\\t")?,
            c if c.is_control() => write!(writer, "\\u{:04x}", c as u32)?,
            c => writer.write_char(c)?,
        }
    }

    writer.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(json: serde_json::Value) -> String {
        to_canonical_string(&Value::from(json))
    }

    #[test]
    fn test_canonicalize_primitives() {
        assert_eq!(canon(json!(null)), "null");
        assert_eq!(canon(json!(true)), "true");
        assert_eq!(canon(json!(42)), "42");
        assert_eq!(canon(json!("hello")), "\"hello\"");
    }

    #[test]
    fn test_canonicalize_object_sorted() {
        assert_eq!(canon(json!({"b": 2, "a": 1, "c": 3})), r#"{"a":1,"b":2,"c":3}"#);
    }

    #[test]
    fn test_canonicalize_nested() {
        let obj = json!({
            "z": {"b": 2, "a": 1},
            "a": [3, 1, 2]
        });
        assert_eq!(canon(obj), r#"{"a":[3,1,2],"z":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_canonicalize_sets() {
        let set = Value::set([Value::from("b"), Value::from("a")]);
        assert_eq!(to_canonical_string(&set), r#"{"a","b"}"#);
        assert_eq!(to_canonical_string(&Value::set([])), "set()");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(canon(json!("hello\nworld")), r#""hello\nworld""#);
    }

    #[test]
    fn test_display_writes_canonical_form() {
        let value = Value::from_json_str(r#"{"b": [1.50, "x"], "a": null}"#).unwrap();
        let mut written = String::new();
        write_canonical(&mut written, &value).unwrap();
        assert_eq!(written, r#"{"a":null,"b":[1.50,"x"]}"#);
        assert_eq!(value.to_string(), written);
        assert_eq!(format!("[{}]", Value::set([])), "[set()]");
    }
}
