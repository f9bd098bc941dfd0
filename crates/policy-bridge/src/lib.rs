//! Policy Bridge
//!
//! Glue between a Rego-style policy engine and Rust host code: typed
//! conversion of policy values, host functions registered as builtins,
//! capability documents filtered down to what a deployment allows, and a
//! module transform that gives boolean rules an implicit `false` default.

pub mod builtin;
pub mod canonical;
pub mod capabilities;
pub mod context;
pub mod convert;
pub mod error;
pub mod module;
pub mod parser;
pub mod registry;
pub mod types;
pub mod value;

pub use builtin::{adapt, adapt_effect, Builtin, BuiltinError};
pub use capabilities::{filter_capabilities, Capabilities, Capability};
pub use context::BuiltinContext;
pub use convert::{
    decode, decode_with, encode, encode_with, ConvertError, ConvertOptions, TimeFormat,
};
pub use error::{BridgeError, Result};
pub use module::{parse_module, Module, ModuleSet};
pub use registry::{BuiltinOptions, Registry};
pub use types::{Decimal, Present, StringSet, Timestamp};
pub use value::{Number, Value};

/// Version of the bridge.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::builtin::{adapt, adapt_effect, BoxError, Builtin};
    pub use crate::capabilities::{filter_capabilities, Capabilities, Capability};
    pub use crate::context::BuiltinContext;
    pub use crate::convert::{decode, encode, ConvertOptions};
    pub use crate::error::{BridgeError, Result};
    pub use crate::module::{parse_module, Module};
    pub use crate::registry::{BuiltinOptions, Registry};
    pub use crate::types::*;
    pub use crate::value::Value;
}
