//! Per-call context handed to host functions.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::types::Timestamp;
use crate::value::Value;

/// What the engine knows about the call in progress.
#[derive(Debug, Clone)]
pub struct BuiltinContext {
    /// Name the builtin was called by.
    pub name: String,

    /// Evaluation time, fixed for the whole query.
    pub time: Timestamp,

    /// Identifier of the query being evaluated.
    pub query_id: u64,

    /// Runtime information exposed to policies.
    pub runtime: Value,

    /// Additional attributes set by the embedding application.
    pub attributes: BTreeMap<String, Value>,
}

impl BuiltinContext {
    /// Creates a context for `name` evaluated now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: Timestamp::from(Utc::now()),
            query_id: 0,
            runtime: Value::Null,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the evaluation time.
    pub fn with_time(mut self, time: Timestamp) -> Self {
        self.time = time;
        self
    }

    /// Sets the query identifier.
    pub fn with_query_id(mut self, query_id: u64) -> Self {
        self.query_id = query_id;
        self
    }

    /// Sets the runtime value.
    pub fn with_runtime(mut self, runtime: Value) -> Self {
        self.runtime = runtime;
        self
    }

    /// Adds an attribute to the context.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Gets a value from the context by field path.
    ///
    /// Field paths use dot notation:
    /// - "name"
    /// - "time"
    /// - "query_id"
    /// - "runtime.env.HOME"
    /// - "attributes.tenant.id"
    ///
    /// Array elements are addressed by index (`"runtime.args.0"`).
    pub fn get_value(&self, field_path: &str) -> Option<Value> {
        let parts: Vec<&str> = field_path.split('.').collect();

        match parts[0] {
            "name" if parts.len() == 1 => Some(Value::from(self.name.as_str())),
            "time" if parts.len() == 1 => Some(Value::from(self.time.to_rfc3339())),
            "query_id" if parts.len() == 1 => Some(Value::from(self.query_id)),
            "runtime" => lookup(&self.runtime, &parts[1..]).cloned(),
            "attributes" => match parts.get(1) {
                Some(key) => lookup(self.attributes.get(*key)?, &parts[2..]).cloned(),
                None => Some(Value::Object(self.attributes.clone())),
            },
            _ => None,
        }
    }
}

fn lookup<'a>(value: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    parts.iter().try_fold(value, |current, part| match current {
        Value::Object(entries) => entries.get(*part),
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => None,
    })
}
