//! Capability sets: which builtins a policy may call.
//!
//! A capability document lists builtin descriptors and optional feature
//! flags. Documents are read from JSON or YAML:
//!
//! ```yaml
//! builtins:
//!   - name: eq
//!     infix: "="
//!     categories: [comparison]
//!   - name: concat
//!     categories: [strings]
//! features: [rego_v1]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::builtin::FunctionDecl;
use crate::error::Result;
use crate::registry::Registry;

/// Infix operators that survive every filter.
pub const CORE_INFIXES: [&str; 3] = ["=", ":=", "in"];

/// Descriptor of one builtin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Builtin name.
    pub name: String,

    /// Operator symbol, for builtins usable infix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infix: Option<String>,

    /// Categories declared by the engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Signature, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl: Option<FunctionDecl>,

    /// Nondeterminism flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nondeterministic: bool,
}

impl Capability {
    /// Creates a descriptor with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            infix: None,
            categories: Vec::new(),
            decl: None,
            nondeterministic: false,
        }
    }

    /// Sets the infix operator.
    pub fn with_infix(mut self, infix: impl Into<String>) -> Self {
        self.infix = Some(infix.into());
        self
    }

    /// Sets the categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    fn has_core_infix(&self) -> bool {
        self.infix
            .as_deref()
            .is_some_and(|infix| CORE_INFIXES.contains(&infix))
    }
}

/// A set of builtin descriptors plus feature flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Builtins in engine order.
    #[serde(default)]
    pub builtins: Vec<Capability>,

    /// Feature flags, copied through filtering unchanged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Capabilities {
    /// Creates a set from descriptors.
    pub fn new(builtins: Vec<Capability>) -> Self {
        Self {
            builtins,
            features: Vec::new(),
        }
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Looks up a builtin by name.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.builtins.iter().find(|b| b.name == name)
    }

    /// Number of builtins.
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// True when there are no builtins.
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    /// Adds the registry's functions. Same-named entries are replaced in
    /// place; new ones are appended in name order.
    pub fn with_registry(mut self, registry: &Registry) -> Self {
        for capability in registry.capabilities() {
            match self.builtins.iter_mut().find(|b| b.name == capability.name) {
                Some(existing) => *existing = capability,
                None => self.builtins.push(capability),
            }
        }
        self
    }
}

/// Parses a capability document. Text opening with `{` is read as JSON,
/// anything else as YAML.
pub fn parse_capabilities(content: &str) -> Result<Capabilities> {
    if content.trim_start().starts_with('{') {
        Capabilities::from_json(content)
    } else {
        Capabilities::from_yaml(content)
    }
}

/// Reduces `base` to the builtins a policy may call.
///
/// A builtin is kept when, in order:
/// 1. its infix is one of [`CORE_INFIXES`];
/// 2. its name is in `allowed_names`;
/// 3. one of its own categories is in `allowed_categories`;
/// 4. the registry records an allowed category for its name.
///
/// Base order and features are preserved.
pub fn filter_capabilities(
    base: &Capabilities,
    registry: &Registry,
    allowed_names: &[&str],
    allowed_categories: &[&str],
) -> Capabilities {
    let names: HashSet<&str> = allowed_names.iter().copied().collect();
    let categories: HashSet<&str> = allowed_categories.iter().copied().collect();
    let allowed = |cats: &[String]| cats.iter().any(|c| categories.contains(c.as_str()));

    let builtins: Vec<Capability> = base
        .builtins
        .iter()
        .filter(|b| {
            b.has_core_infix()
                || names.contains(b.name.as_str())
                || allowed(&b.categories)
                || registry.categories(&b.name).is_some_and(|cats| allowed(cats))
        })
        .cloned()
        .collect();

    tracing::debug!(
        kept = builtins.len(),
        dropped = base.builtins.len() - builtins.len(),
        "filtered capabilities"
    );

    Capabilities {
        builtins,
        features: base.features.clone(),
    }
}
