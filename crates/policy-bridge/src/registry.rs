//! Registration facade: named host functions with engine metadata.

use std::collections::BTreeMap;

use crate::builtin::{
    adapt_effect_with, adapt_with, Builtin, EffectFn, FunctionDecl, HostFn,
};
use crate::capabilities::Capability;
use crate::context::BuiltinContext;
use crate::convert::ConvertOptions;
use crate::error::{BridgeError, Result};
use crate::value::Value;

/// Metadata attached to a registration.
#[derive(Debug, Clone, Default)]
pub struct BuiltinOptions {
    /// Capability categories the function belongs to.
    pub categories: Vec<String>,

    /// True when results may differ between calls with equal arguments.
    pub nondeterministic: bool,

    /// Conversion settings for arguments and result.
    pub convert_options: ConvertOptions,
}

impl BuiltinOptions {
    /// Deterministic, uncategorized, default conversion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capability categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the function as nondeterministic or not.
    pub fn nondeterministic(mut self, nondeterministic: bool) -> Self {
        self.nondeterministic = nondeterministic;
        self
    }

    /// Sets the conversion settings.
    pub fn with_convert_options(mut self, options: ConvertOptions) -> Self {
        self.convert_options = options;
        self
    }
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct RegisteredBuiltin {
    /// Registered name.
    pub name: String,
    /// Adapted function with its declaration.
    pub builtin: Builtin,
    /// Capability categories.
    pub categories: Vec<String>,
    /// Nondeterminism flag.
    pub nondeterministic: bool,
}

impl RegisteredBuiltin {
    /// Declared signature.
    pub fn decl(&self) -> &FunctionDecl {
        self.builtin.decl()
    }

    /// Capability descriptor for this entry.
    pub fn capability(&self) -> Capability {
        Capability {
            name: self.name.clone(),
            infix: None,
            categories: self.categories.clone(),
            decl: Some(self.decl().clone()),
            nondeterministic: self.nondeterministic,
        }
    }
}

/// Host functions by name.
///
/// Filled during setup and read during filtering and dispatch. There is no
/// internal locking; share it behind `Arc` once registration is done.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, RegisteredBuiltin>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function returning a value. An existing entry with the
    /// same name is replaced, categories included.
    pub fn register<Args, R, F>(
        &mut self,
        name: impl Into<String>,
        f: F,
        options: BuiltinOptions,
    ) -> &mut Self
    where
        F: HostFn<Args, R>,
    {
        let builtin = adapt_with(f, options.convert_options.clone());
        self.insert(name, builtin, options)
    }

    /// Registers a function that only reports success; it yields `null`.
    pub fn register_effect<Args, F>(
        &mut self,
        name: impl Into<String>,
        f: F,
        options: BuiltinOptions,
    ) -> &mut Self
    where
        F: EffectFn<Args>,
    {
        let builtin = adapt_effect_with(f, options.convert_options.clone());
        self.insert(name, builtin, options)
    }

    /// Registers an already adapted builtin.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        builtin: Builtin,
        options: BuiltinOptions,
    ) -> &mut Self {
        let name = name.into();
        tracing::debug!(
            builtin = %name,
            decl = %builtin.decl(),
            categories = ?options.categories,
            nondeterministic = options.nondeterministic,
            "registering builtin"
        );
        let entry = RegisteredBuiltin {
            name: name.clone(),
            builtin,
            categories: options.categories,
            nondeterministic: options.nondeterministic,
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            tracing::debug!(builtin = %name, "replaced existing registration");
        }
        self
    }

    /// Looks up an entry.
    pub fn get(&self, name: &str) -> Option<&RegisteredBuiltin> {
        self.entries.get(name)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Categories recorded for `name`.
    pub fn categories(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|entry| entry.categories.as_slice())
    }

    /// Calls a registered function.
    pub fn call(&self, name: &str, ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| BridgeError::UnknownBuiltin(name.to_string()))?;
        entry.builtin.call(ctx, args).map_err(|source| BridgeError::Builtin {
            name: name.to_string(),
            source,
        })
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredBuiltin> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capability descriptors for every entry, in name order.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.iter().map(RegisteredBuiltin::capability).collect()
    }
}
