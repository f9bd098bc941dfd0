//! Policy modules: a statement-level syntax tree and the default-rule
//! transform.

mod transform;

use std::fmt;

use crate::error::Result;

pub use transform::{
    add_default_false, add_import, has_feature, parse_module, DEFAULT_FALSE_FEATURE,
    FEATURE_PREFIX,
};

/// `import <path> [as <alias>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dotted reference, e.g. `data.lib.util`.
    pub path: String,
    /// Local name, if given.
    pub alias: Option<String>,
}

impl Import {
    /// Import without an alias.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "import {}", self.path)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        Ok(())
    }
}

/// Shape of a rule head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Defines one value (`allow if ...`, `x := 1`, `f(a) := b`).
    Complete,
    /// Contributes members to a set (`deny contains msg if ...`).
    PartialSet,
    /// Contributes entries to an object (`roles[user] := r if ...`).
    PartialObject,
}

/// One rule and its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// `default` rule.
    pub default: bool,
    /// Head reference, e.g. `allow` or `a.b.c`.
    pub reference: String,
    /// Function parameters; empty for non-function rules.
    pub args: Vec<String>,
    /// Head shape.
    pub kind: RuleKind,
    /// Value term text after `:=`/`=`; `None` means the implicit `true`.
    pub value: Option<String>,
    /// Has an `if` condition or a body.
    pub conditional: bool,
    /// 1-based line of the rule head; 0 for synthesized rules.
    pub line: usize,
    pub(crate) text: String,
}

impl Rule {
    /// `default <reference> := false`
    pub fn default_false(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            text: format!("default {} := false", reference),
            default: true,
            reference,
            args: Vec::new(),
            kind: RuleKind::Complete,
            value: Some("false".to_string()),
            conditional: false,
            line: 0,
        }
    }

    /// True for rules whose value is a boolean literal or implicit.
    pub fn is_boolean(&self) -> bool {
        matches!(self.value.as_deref(), None | Some("true") | Some("false"))
    }

    /// True for rules with parameters.
    pub fn is_function(&self) -> bool {
        !self.args.is_empty()
    }

    /// Source text of the rule.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A parsed policy module.
///
/// `Display` re-emits the module as source text that parses back to an
/// equivalent module. Comments are not preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// File name the source came from.
    pub filename: String,
    /// Package path without the `package` keyword.
    pub package: String,
    /// Imports in declaration order.
    pub imports: Vec<Import>,
    /// Rules in declaration order.
    pub rules: Vec<Rule>,
}

impl Module {
    /// Rules whose reference is `reference`.
    pub fn rules_named<'a>(&'a self, reference: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.reference == reference)
    }

    /// Returns true if a `default` rule exists for `reference`.
    pub fn has_default(&self, reference: &str) -> bool {
        self.rules_named(reference).any(|r| r.default)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "package {}", self.package)?;
        if !self.imports.is_empty() {
            writeln!(f)?;
            for import in &self.imports {
                writeln!(f, "{}", import)?;
            }
        }
        for rule in &self.rules {
            writeln!(f)?;
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

/// A module source waiting to be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// File name used in errors.
    pub filename: String,
    /// Source text.
    pub source: String,
    /// Extra import paths to add.
    pub imports: Vec<String>,
}

/// Several modules parsed together.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    sources: Vec<ModuleSource>,
}

impl ModuleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module source.
    pub fn with_module<I, S>(
        mut self,
        filename: impl Into<String>,
        source: impl Into<String>,
        imports: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.push(ModuleSource {
            filename: filename.into(),
            source: source.into(),
            imports: imports.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Sources in insertion order.
    pub fn sources(&self) -> &[ModuleSource] {
        &self.sources
    }

    /// Parses every module, stopping at the first error.
    pub fn parse(&self) -> Result<Vec<Module>> {
        self.sources
            .iter()
            .map(|s| parse_module(&s.filename, &s.source, &s.imports))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_module_set_parses_all() {
        let modules = ModuleSet::new()
            .with_module("a.rego", "package a\n\nallow if input.ok\n", Vec::<String>::new())
            .with_module("b.rego", "package b\n\nx := 1\n", ["data.a"])
            .parse()
            .unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].imports, vec![Import::new("data.a")]);
    }

    #[test]
    fn test_module_set_first_error_wins() {
        let err = ModuleSet::new()
            .with_module("ok.rego", "package ok\n", Vec::<String>::new())
            .with_module("bad.rego", "allow if true\n", Vec::<String>::new())
            .with_module("worse.rego", "package {\n", Vec::<String>::new())
            .parse()
            .unwrap_err();
        assert!(matches!(err, BridgeError::ModuleParse { filename, .. } if filename == "bad.rego"));
    }

    #[test]
    fn test_display_round_trips() {
        let source = r#"package authz

import data.lib.roles as roles

default allow := false

allow if {
    roles.is_admin(input.user)
}
"#;
        let module = parse_module("authz.rego", source, &[] as &[String]).unwrap();
        let printed = module.to_string();
        assert_eq!(printed, source);
        let again = parse_module("authz.rego", &printed, &[] as &[String]).unwrap();
        assert_eq!(again.rules.len(), module.rules.len());
    }
}
