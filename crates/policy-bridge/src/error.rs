//! Error types for the policy bridge.

use thiserror::Error;

use crate::builtin::BuiltinError;
use crate::convert::ConvertError;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by the crate-level entry points.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A value could not be converted.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConvertError),

    /// A registered builtin failed.
    #[error("Builtin '{name}' failed: {source}")]
    Builtin {
        /// Name the builtin was called by.
        name: String,
        /// What went wrong.
        #[source]
        source: BuiltinError,
    },

    /// No builtin is registered under the name.
    #[error("Unknown builtin: {0}")]
    UnknownBuiltin(String),

    /// Module source could not be parsed.
    #[error("Parse error in {filename:?} at line {line}: {message}")]
    ModuleParse {
        /// File name given with the source.
        filename: String,
        /// 1-based line number.
        line: usize,
        /// What the parser expected.
        message: String,
    },

    /// A capability document could not be parsed.
    #[error("Failed to parse capabilities: {0}")]
    ParseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::ParseError(err.to_string())
    }
}
