//! Host functions adapted to the engine's calling convention.
//!
//! The engine calls every builtin as `(&BuiltinContext, &[Value]) -> Value`.
//! [`adapt`] turns a typed Rust function into that shape: arguments are
//! decoded with [`crate::decode`], the result is encoded with
//! [`crate::encode`], and the declaration is derived from the static types.
//!
//! ```
//! use policy_bridge::builtin::{adapt, BoxError};
//! use policy_bridge::{BuiltinContext, Value};
//!
//! fn shout(_: &BuiltinContext, text: String) -> Result<String, BoxError> {
//!     Ok(text.to_uppercase())
//! }
//!
//! let builtin = adapt(shout);
//! let out = builtin.call(&BuiltinContext::new("shout"), &[Value::from("hi")]).unwrap();
//! assert_eq!(out, Value::from("HI"));
//! ```

pub mod adapter;
pub mod decl;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::BuiltinContext;
use crate::convert::{ConvertError, ConvertOptions};
use crate::value::Value;

pub use adapter::{EffectFn, HostFn};
pub use decl::{type_tag_of, FunctionDecl, TypeTag};

/// Error type host functions may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an adapted call failed.
#[derive(Debug, Error)]
pub enum BuiltinError {
    /// The engine passed the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    Arity {
        /// Declared parameter count.
        expected: usize,
        /// Arguments received.
        got: usize,
    },

    /// An argument could not be decoded into its parameter type.
    #[error("argument {index}: {source}")]
    Argument {
        /// Zero-based argument position.
        index: usize,
        /// Conversion failure.
        #[source]
        source: ConvertError,
    },

    /// The returned value could not be encoded.
    #[error("result: {0}")]
    Result(#[source] ConvertError),

    /// The host function itself failed.
    #[error(transparent)]
    Host(BoxError),
}

type CallFn = dyn Fn(&BuiltinContext, &[Value]) -> Result<Value, BuiltinError> + Send + Sync;

/// An adapted host function with its declaration. Cheap to clone.
#[derive(Clone)]
pub struct Builtin {
    decl: FunctionDecl,
    func: Arc<CallFn>,
}

impl Builtin {
    /// Declared signature.
    pub fn decl(&self) -> &FunctionDecl {
        &self.decl
    }

    /// Calls the function with engine values.
    pub fn call(&self, ctx: &BuiltinContext, args: &[Value]) -> Result<Value, BuiltinError> {
        tracing::trace!(builtin = %ctx.name, args = args.len(), "invoking host function");
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("decl", &self.decl).finish_non_exhaustive()
    }
}

/// Adapts a function returning a value.
pub fn adapt<Args, R, F: HostFn<Args, R>>(f: F) -> Builtin {
    adapt_with(f, ConvertOptions::default())
}

/// Adapts a function returning a value, converting with `options`.
pub fn adapt_with<Args, R, F: HostFn<Args, R>>(f: F, options: ConvertOptions) -> Builtin {
    Builtin {
        decl: <F as HostFn<Args, R>>::decl(),
        func: Arc::new(move |ctx: &BuiltinContext, args: &[Value]| {
            f.invoke(ctx, args, &options)
        }),
    }
}

/// Adapts a function that only reports success.
pub fn adapt_effect<Args, F: EffectFn<Args>>(f: F) -> Builtin {
    adapt_effect_with(f, ConvertOptions::default())
}

/// Adapts a function that only reports success, converting with `options`.
pub fn adapt_effect_with<Args, F: EffectFn<Args>>(f: F, options: ConvertOptions) -> Builtin {
    Builtin {
        decl: <F as EffectFn<Args>>::decl(),
        func: Arc::new(move |ctx: &BuiltinContext, args: &[Value]| {
            f.invoke(ctx, args, &options)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Decimal, StringSet, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> BuiltinContext {
        BuiltinContext::new("test")
    }

    fn add(_: &BuiltinContext, a: i64, b: i64) -> Result<i64, BoxError> {
        Ok(a + b)
    }

    #[test]
    fn test_adapt_two_args() {
        let builtin = adapt(add);
        assert_eq!(
            builtin.decl(),
            &FunctionDecl::new(vec![TypeTag::Number, TypeTag::Number], Some(TypeTag::Number))
        );
        let out = builtin.call(&ctx(), &[Value::from(2), Value::from(40)]).unwrap();
        assert_eq!(out, Value::from(42));
    }

    #[test]
    fn test_arity_mismatch_skips_host() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn counted(_: &BuiltinContext, a: String, b: String) -> Result<String, BoxError> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(a + &b)
        }

        let builtin = adapt(counted);
        for args in [vec![Value::from("a")], vec![Value::from("a"), Value::from("b"), Value::from("c")]] {
            let err = builtin.call(&ctx(), &args).unwrap_err();
            assert!(matches!(err, BuiltinError::Arity { expected: 2, .. }));
        }
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        builtin.call(&ctx(), &[Value::from("a"), Value::from("b")]).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_argument_error_reports_first_failure() {
        let builtin = adapt(add);
        let err = builtin
            .call(&ctx(), &[Value::from(1), Value::from("x")])
            .unwrap_err();
        assert!(matches!(err, BuiltinError::Argument { index: 1, .. }));
        assert_eq!(err.to_string(), "argument 1: expected i64, found string");
    }

    #[test]
    fn test_host_error_passes_through() {
        #[derive(Debug, Error)]
        #[error("quota exceeded")]
        struct Quota;

        fn limited(_: &BuiltinContext, _n: u32) -> Result<bool, Quota> {
            Err(Quota)
        }

        let err = adapt(limited).call(&ctx(), &[Value::from(1)]).unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        match err {
            BuiltinError::Host(inner) => assert!(inner.downcast_ref::<Quota>().is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_args_and_closures() {
        let now = adapt(|c: &BuiltinContext| -> Result<Timestamp, BoxError> { Ok(c.time) });
        assert_eq!(now.decl(), &FunctionDecl::new(vec![], Some(TypeTag::String)));
        let c = ctx();
        assert_eq!(now.call(&c, &[]).unwrap(), Value::from(c.time.to_rfc3339()));

        let five = adapt(
            |_: &BuiltinContext, a: u8, b: u8, c: u8, d: u8, e: u8| -> Result<u32, BoxError> {
                Ok(u32::from(a) + u32::from(b) + u32::from(c) + u32::from(d) + u32::from(e))
            },
        );
        let args: Vec<Value> = (1..=5).map(Value::from).collect();
        assert_eq!(five.call(&ctx(), &args).unwrap(), Value::from(15));
    }

    #[test]
    fn test_effect_form_returns_null() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let builtin = adapt_effect(move |_: &BuiltinContext, tags: StringSet| -> Result<(), BoxError> {
            counter.fetch_add(tags.len(), Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(builtin.decl(), &FunctionDecl::new(vec![TypeTag::Any], None));

        let tags = Value::set([Value::from("a"), Value::from("b")]);
        assert_eq!(builtin.call(&ctx(), &[tags]).unwrap(), Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_effect_failure_propagates() {
        let builtin = adapt_effect(|_: &BuiltinContext| -> Result<(), BoxError> {
            Err("audit sink unavailable".into())
        });
        let err = builtin.call(&ctx(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "audit sink unavailable");
    }

    #[test]
    fn test_decimal_arguments_are_exact() {
        fn total(_: &BuiltinContext, prices: Vec<Decimal>) -> Result<Decimal, BoxError> {
            Ok(Decimal(prices.iter().map(|p| p.0).sum()))
        }
        let prices = Value::array([
            Value::number("0.1").unwrap(),
            Value::number("0.2").unwrap(),
        ]);
        let out = adapt(total).call(&ctx(), &[prices]).unwrap();
        assert_eq!(out.as_number().map(|n| n.as_str()), Some("0.3"));
    }

    #[test]
    fn test_result_encode_failure() {
        let builtin = adapt(|_: &BuiltinContext| -> Result<f64, BoxError> { Ok(f64::NAN) });
        let err = builtin.call(&ctx(), &[]).unwrap_err();
        assert!(matches!(err, BuiltinError::Result(_)));
    }
}
