//! Engine-level type declarations for host functions.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::fmt;

use crate::types::{Decimal, Timestamp};

/// The engine's coarse type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// `true` / `false`
    Boolean,
    /// Any number.
    Number,
    /// Text.
    String,
    /// Anything else.
    Any,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Any => "any",
        };
        f.write_str(name)
    }
}

/// Maps a static host type to its engine type tag.
///
/// Only exact types are recognized; `Option<bool>` and other wrappers are
/// `Any`.
pub fn type_tag_of<T: ?Sized + 'static>() -> TypeTag {
    let id = TypeId::of::<T>();
    let is = |others: &[TypeId]| others.contains(&id);

    if id == TypeId::of::<bool>() {
        TypeTag::Boolean
    } else if is(&[
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<Decimal>(),
        TypeId::of::<Option<Decimal>>(),
    ]) {
        TypeTag::Number
    } else if is(&[
        TypeId::of::<String>(),
        TypeId::of::<char>(),
        TypeId::of::<Timestamp>(),
    ]) {
        TypeTag::String
    } else {
        TypeTag::Any
    }
}

/// Declared signature of a host function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Parameter tags in order.
    pub args: Vec<TypeTag>,
    /// Result tag; `None` for functions that only report success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TypeTag>,
}

impl FunctionDecl {
    /// Creates a declaration.
    pub fn new(args: Vec<TypeTag>, result: Option<TypeTag>) -> Self {
        Self { args, result }
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")?;
        if let Some(result) = self.result {
            write!(f, " => {}", result)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_type_tags() {
        assert_eq!(type_tag_of::<bool>(), TypeTag::Boolean);
        assert_eq!(type_tag_of::<u8>(), TypeTag::Number);
        assert_eq!(type_tag_of::<f64>(), TypeTag::Number);
        assert_eq!(type_tag_of::<Decimal>(), TypeTag::Number);
        assert_eq!(type_tag_of::<Option<Decimal>>(), TypeTag::Number);
        assert_eq!(type_tag_of::<String>(), TypeTag::String);
        assert_eq!(type_tag_of::<Timestamp>(), TypeTag::String);
        assert_eq!(type_tag_of::<Vec<String>>(), TypeTag::Any);
        assert_eq!(type_tag_of::<HashMap<String, i32>>(), TypeTag::Any);
        assert_eq!(type_tag_of::<Option<bool>>(), TypeTag::Any);
    }

    #[test]
    fn test_decl_serializes_lowercase() {
        let decl = FunctionDecl::new(vec![TypeTag::String, TypeTag::Number], Some(TypeTag::Boolean));
        assert_eq!(
            serde_json::to_value(&decl).unwrap(),
            serde_json::json!({"args": ["string", "number"], "result": "boolean"})
        );
        assert_eq!(decl.to_string(), "(string, number) => boolean");

        let effect = FunctionDecl::new(vec![], None);
        assert_eq!(serde_json::to_value(&effect).unwrap(), serde_json::json!({"args": []}));
    }
}
