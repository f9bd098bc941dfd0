use std::collections::HashSet;

use super::{Import, Module, Rule, RuleKind};
use crate::error::Result;
use crate::parser::parse_source;

/// Import prefix under which feature switches live.
pub const FEATURE_PREFIX: &str = "data.policy_bridge";

/// Feature that gives boolean rules an implicit `false` default.
pub const DEFAULT_FALSE_FEATURE: &str = "default_false";

/// Parses a module, appends `imports`, and applies the features the module
/// imports.
///
/// With `import data.policy_bridge.default_false`, every boolean or
/// conditional rule without a default gets `default <rule> := false`.
/// Running the transform on its own output adds nothing.
pub fn parse_module<S: AsRef<str>>(filename: &str, source: &str, imports: &[S]) -> Result<Module> {
    let mut module = parse_source(filename, source)?;

    for path in imports {
        add_import(&mut module, path.as_ref());
    }

    if has_feature(&module, DEFAULT_FALSE_FEATURE) {
        let added = add_default_false(&mut module);
        tracing::debug!(filename, added, "applied default_false");
    }

    Ok(module)
}

/// Appends an import. Empty paths and paths already imported without an
/// alias are skipped. Returns true if the module changed.
pub fn add_import(module: &mut Module, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    if module
        .imports
        .iter()
        .any(|i| i.path == path && i.alias.is_none())
    {
        return false;
    }
    module.imports.push(Import::new(path));
    true
}

/// Returns true if the module imports `data.policy_bridge.<feature>`.
pub fn has_feature(module: &Module, feature: &str) -> bool {
    let target = format!("{}.{}", FEATURE_PREFIX, feature);
    module.imports.iter().any(|i| i.path == target)
}

/// Adds `default <rule> := false` for each eligible rule and returns how
/// many were added.
///
/// Eligible: not a function, not a partial set or object rule, boolean
/// valued or conditional, and no default for the same reference yet. At
/// most one default is added per reference.
pub fn add_default_false(module: &mut Module) -> usize {
    let mut covered: HashSet<&str> = module
        .rules
        .iter()
        .filter(|r| r.default)
        .map(|r| r.reference.as_str())
        .collect();

    let mut added = Vec::new();
    for rule in &module.rules {
        if rule.default || rule.is_function() || rule.kind != RuleKind::Complete {
            continue;
        }
        if !(rule.is_boolean() || rule.conditional) {
            continue;
        }
        if covered.insert(rule.reference.as_str()) {
            tracing::trace!(rule = %rule.reference, "adding default false");
            added.push(Rule::default_false(rule.reference.as_str()));
        }
    }

    let count = added.len();
    module.rules.extend(added);
    count
}
