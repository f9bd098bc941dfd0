use std::collections::HashMap;

use policy_bridge::builtin::BoxError;
use policy_bridge::capabilities::{parse_capabilities, CORE_INFIXES};
use policy_bridge::convert::ConvertErrorKind;
use policy_bridge::prelude::*;
use policy_bridge::{BuiltinError, ModuleSet};
use serde::{Deserialize, Serialize};

const CAPABILITIES: &str = include_str!("fixtures/capabilities.yaml");

#[derive(Debug, Deserialize, PartialEq)]
struct Request {
    user: String,
    roles: Vec<String>,
    amount: Decimal,
    at: Timestamp,
}

#[derive(Debug, Serialize)]
struct Verdict {
    allowed: bool,
    limit: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn check_limit(
    _: &BuiltinContext,
    req: Request,
    cap: Decimal,
) -> std::result::Result<Verdict, BoxError> {
    let allowed = req.amount <= cap;
    Ok(Verdict {
        allowed,
        limit: cap,
        reason: (!allowed).then(|| format!("{} over limit", req.user)),
    })
}

fn names(caps: &Capabilities) -> Vec<&str> {
    caps.builtins.iter().map(|b| b.name.as_str()).collect()
}

#[test]
fn test_registered_function_end_to_end() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    registry.register(
        "acme.check_limit",
        check_limit,
        BuiltinOptions::new().with_categories(["acme"]),
    );

    let request = Value::from_json_str(
        r#"{"user": "ana", "amount": 120.50, "at": "2024-05-01T10:00:00.5Z", "extra": true}"#,
    )?;
    let ctx = BuiltinContext::new("acme.check_limit");

    let out = registry.call("acme.check_limit", &ctx, &[request.clone(), Value::number("100")?])?;
    assert_eq!(out.get("allowed"), Some(&Value::from(false)));
    assert_eq!(out.get("limit"), Some(&Value::number("100")?));
    assert_eq!(out.get("reason"), Some(&Value::from("ana over limit")));

    let out = registry.call("acme.check_limit", &ctx, &[request, Value::number("500.00")?])?;
    assert_eq!(out.get("allowed"), Some(&Value::from(true)));
    assert_eq!(out.get("limit"), Some(&Value::number("500")?));
    assert_eq!(out.get("reason"), None);
    Ok(())
}

#[test]
fn test_typed_round_trips() -> anyhow::Result<()> {
    let amount: Decimal = "123.4500000".parse()?;
    let encoded = encode(&amount)?;
    assert_eq!(encoded, Value::number("123.45")?);
    assert_eq!(decode::<Decimal>(&encoded)?, amount);

    let at = Timestamp::parse_rfc3339("2024-01-02T03:04:05.123456789Z")?;
    let encoded = encode(&at)?;
    assert_eq!(encoded, Value::from("2024-01-02T03:04:05.123456789Z"));
    assert_eq!(decode::<Timestamp>(&encoded)?, at);

    let err = decode::<Timestamp>(&Value::from("yesterday")).unwrap_err();
    assert!(matches!(err.kind(), ConvertErrorKind::Parse { .. }));

    assert_eq!(encode(&None::<i32>)?, Value::Null);
    assert_eq!(decode::<Option<i32>>(&Value::Null)?, None);
    let err = decode::<i32>(&Value::Null).unwrap_err();
    assert!(matches!(err.kind(), ConvertErrorKind::NullNotAllowed { .. }));
    Ok(())
}

#[test]
fn test_struct_partiality() -> anyhow::Result<()> {
    let value = Value::from_json_str(
        r#"{"user": "bo", "amount": 1, "at": "2024-01-01T00:00:00Z", "unknown": [1, 2]}"#,
    )?;
    let request: Request = decode(&value)?;
    assert_eq!(request.user, "bo");
    assert!(request.roles.is_empty());
    assert_eq!(request.amount, Decimal::from(1));
    assert_eq!(request.at.to_string(), "2024-01-01T00:00:00Z");

    let request: Request = decode(&Value::from_json_str(r#"{"user": "cy"}"#)?)?;
    assert_eq!(request.amount, Decimal::from(0));
    assert_eq!(request.at.to_string(), "0001-01-01T00:00:00Z");
    Ok(())
}

#[test]
fn test_presence_set_idiom() -> anyhow::Result<()> {
    let tags: HashMap<String, Present> =
        [("foo".to_string(), Present), ("bar".to_string(), Present)].into();
    let encoded = encode(&tags)?;
    assert_eq!(encoded, Value::set([Value::from("bar"), Value::from("foo")]));

    let back: HashMap<String, Present> = decode(&encoded)?;
    assert_eq!(back, tags);

    let set: StringSet = decode(&encoded)?;
    assert!(set.contains("foo") && set.contains("bar"));
    Ok(())
}

#[test]
fn test_arity_is_enforced_before_invoking() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let builtin = adapt(
        move |_: &BuiltinContext, a: i64, b: i64| -> std::result::Result<i64, BoxError> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(a + b)
        },
    );
    let ctx = BuiltinContext::new("sum");

    for args in [vec![Value::from(1)], vec![Value::from(1), Value::from(2), Value::from(3)]] {
        let err = builtin.call(&ctx, &args).unwrap_err();
        assert!(matches!(err, BuiltinError::Arity { expected: 2, .. }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(builtin.call(&ctx, &[Value::from(1), Value::from(2)]).unwrap(), Value::from(3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_integer_range() {
    let err = decode::<i8>(&Value::from(300)).unwrap_err();
    assert!(matches!(err.kind(), ConvertErrorKind::Range { .. }));
    assert_eq!(decode::<i8>(&Value::from(100)).unwrap(), 100);
}

#[test]
fn test_capability_filtering_from_document() -> anyhow::Result<()> {
    let full = parse_capabilities(CAPABILITIES)?;
    assert_eq!(full.len(), 9);

    let registry = Registry::new();
    let core = filter_capabilities(&full, &registry, &[], &[]);
    assert_eq!(names(&core), ["eq", "assign", "internal.member_2"]);
    let infixes: Vec<_> = core.builtins.iter().filter_map(|b| b.infix.as_deref()).collect();
    assert_eq!(infixes, CORE_INFIXES);

    let with_concat = filter_capabilities(&full, &registry, &["concat"], &[]);
    assert_eq!(names(&with_concat), ["eq", "assign", "internal.member_2", "concat"]);
    assert!(with_concat.len() < full.len());
    assert_eq!(with_concat.features, ["rego_v1"]);
    Ok(())
}

#[test]
fn test_capability_filtering_by_registered_category() -> anyhow::Result<()> {
    let full = parse_capabilities(CAPABILITIES)?;
    let mut registry = Registry::new();
    registry.register(
        "acme.user_roles",
        |_: &BuiltinContext, user: String| -> std::result::Result<Vec<String>, BoxError> {
            Ok(vec![format!("{}:reader", user)])
        },
        BuiltinOptions::new().with_categories(["acme"]),
    );

    let filtered = filter_capabilities(&full, &registry, &[], &["acme", "http"]);
    assert_eq!(
        names(&filtered),
        ["eq", "assign", "internal.member_2", "http.send", "acme.user_roles"]
    );
    assert!(filtered.get("http.send").is_some_and(|c| c.nondeterministic));
    Ok(())
}

#[test]
fn test_default_false_injection() -> anyhow::Result<()> {
    let source = "package authz\n\nimport data.policy_bridge.default_false\n\nallow if {\n    input.user == \"admin\"\n}\n";
    let module = parse_module("authz.rego", source, &[] as &[&str])?;
    let defaults: Vec<_> = module.rules.iter().filter(|r| r.default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].text(), "default allow := false");

    let again = parse_module("authz.rego", &module.to_string(), &[] as &[&str])?;
    assert_eq!(again.rules.iter().filter(|r| r.default).count(), 1);
    assert_eq!(again.to_string(), module.to_string());
    Ok(())
}

#[test]
fn test_module_set_applies_extra_imports() -> anyhow::Result<()> {
    let modules = ModuleSet::new()
        .with_module("a.rego", "package a\n\nallow if input.ok\n", ["data.policy_bridge.default_false"])
        .with_module("b.rego", "package b\n\nallow if input.ok\n", Vec::<String>::new())
        .parse()?;

    assert!(modules[0].has_default("allow"));
    assert!(!modules[1].has_default("allow"));
    Ok(())
}
