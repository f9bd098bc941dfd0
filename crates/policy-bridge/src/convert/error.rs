//! Conversion errors with a breadcrumb path to the failing position.

use std::fmt;

use thiserror::Error;

/// One step of the path from the converted root to the failing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A struct field or map key.
    Key(String),
    /// A sequence position.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) if is_plain_key(key) => write!(f, ".{}", key),
            PathSegment::Key(key) => write!(f, "[{:?}]", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The root cause of a failed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertErrorKind {
    /// The value's kind does not fit the target type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Description of what the target accepts.
        expected: String,
        /// Kind of the offending value.
        found: String,
    },

    /// A number parsed but does not fit the target width.
    #[error("number {value} is out of range for {target}")]
    Range {
        /// Target type name.
        target: String,
        /// The offending number text.
        value: String,
    },

    /// A textual value failed a format-specific parse.
    #[error("cannot parse {target}: {message}")]
    Parse {
        /// Target type name.
        target: String,
        /// Parser message.
        message: String,
    },

    /// An array is longer than a fixed-size target.
    #[error("array of length {len} exceeds target capacity {capacity}")]
    LengthMismatch {
        /// Capacity of the target.
        capacity: usize,
        /// Length of the array.
        len: usize,
    },

    /// A map key or set member is not a string.
    #[error("keys must be strings, found {found}")]
    KeyType {
        /// What was found instead.
        found: String,
    },

    /// No conversion rule exists for the shape.
    #[error("unsupported type: {0}")]
    Unsupported(String),

    /// `null` given for a target that cannot be empty.
    #[error("null is not allowed for {target}")]
    NullNotAllowed {
        /// Target type name.
        target: String,
    },

    /// Message raised by a serde implementation.
    #[error("{0}")]
    Message(String),
}

/// A conversion failure: root cause plus the path where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError {
    kind: ConvertErrorKind,
    path: Vec<PathSegment>,
}

impl ConvertError {
    /// Creates an error at the root position.
    pub fn new(kind: ConvertErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    /// The root cause.
    pub fn kind(&self) -> &ConvertErrorKind {
        &self.kind
    }

    /// Path from the root to the failing value, outermost first.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Prefixes the path with the position of the enclosing container.
    pub fn at(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    pub(crate) fn at_key(self, key: &str) -> Self {
        self.at(PathSegment::Key(key.to_string()))
    }

    pub(crate) fn at_index(self, index: usize) -> Self {
        self.at(PathSegment::Index(index))
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub(crate) fn range(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::Range {
            target: target.into(),
            value: value.into(),
        })
    }

    pub(crate) fn parse(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::new(ConvertErrorKind::Parse {
            target: target.into(),
            message: message.to_string(),
        })
    }

    pub(crate) fn null_not_allowed(target: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::NullNotAllowed {
            target: target.into(),
        })
    }

    pub(crate) fn key_type(found: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::KeyType {
            found: found.into(),
        })
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Self::new(ConvertErrorKind::Unsupported(what.into()))
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.kind);
        }
        f.write_str("at ")?;
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for ConvertError {}

impl serde::de::Error for ConvertError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ConvertError::new(ConvertErrorKind::Message(msg.to_string()))
    }

    fn invalid_type(unexp: serde::de::Unexpected<'_>, exp: &dyn serde::de::Expected) -> Self {
        ConvertError::type_mismatch(exp.to_string(), unexp.to_string())
    }

    fn invalid_value(unexp: serde::de::Unexpected<'_>, exp: &dyn serde::de::Expected) -> Self {
        ConvertError::parse(exp.to_string(), format!("invalid value {}", unexp))
    }

    fn invalid_length(len: usize, exp: &dyn serde::de::Expected) -> Self {
        ConvertError::new(ConvertErrorKind::Message(format!(
            "invalid length {}, expected {}",
            len, exp
        )))
    }
}

impl serde::ser::Error for ConvertError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ConvertError::new(ConvertErrorKind::Message(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_path() {
        let err = ConvertError::range("i8", "300");
        assert_eq!(err.to_string(), "number 300 is out of range for i8");
    }

    #[test]
    fn test_display_with_breadcrumbs() {
        let err = ConvertError::type_mismatch("a number", "string")
            .at_key("weird key")
            .at_index(2)
            .at_key("items");
        assert_eq!(
            err.to_string(),
            r#"at .items[2]["weird key"]: expected a number, found string"#
        );
        assert_eq!(err.path().len(), 3);
    }
}
