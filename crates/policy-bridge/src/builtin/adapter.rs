//! Fixed-arity host functions behind one calling convention.
//!
//! [`HostFn`] and [`EffectFn`] are implemented for every
//! `Fn(&BuiltinContext, T1, .., TN) -> Result<_, E>` with `N` from 0 to 5.
//! Arguments decode left to right and the first failure stops the call;
//! the host function is never invoked with a partial argument list.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::decl::{type_tag_of, FunctionDecl};
use super::{BoxError, BuiltinError};
use crate::context::BuiltinContext;
use crate::convert::{decode_with, encode_with, ConvertOptions};
use crate::value::Value;

/// A host function returning a value.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// implementations for different arities apart.
pub trait HostFn<Args, R>: Send + Sync + 'static {
    /// Signature derived from the parameter and result types.
    fn decl() -> FunctionDecl;

    /// Decodes `args`, calls the function and encodes its result.
    fn invoke(
        &self,
        ctx: &BuiltinContext,
        args: &[Value],
        options: &ConvertOptions,
    ) -> Result<Value, BuiltinError>;
}

/// A host function that only reports success or failure. Success is `null`
/// on the policy side.
pub trait EffectFn<Args>: Send + Sync + 'static {
    /// Signature derived from the parameter types. There is no result tag.
    fn decl() -> FunctionDecl;

    /// Decodes `args` and calls the function.
    fn invoke(
        &self,
        ctx: &BuiltinContext,
        args: &[Value],
        options: &ConvertOptions,
    ) -> Result<Value, BuiltinError>;
}

fn check_arity(args: &[Value], expected: usize) -> Result<(), BuiltinError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BuiltinError::Arity {
            expected,
            got: args.len(),
        })
    }
}

fn decode_arg<T: DeserializeOwned>(
    args: &[Value],
    index: usize,
    options: &ConvertOptions,
) -> Result<T, BuiltinError> {
    let value = args.get(index).ok_or(BuiltinError::Arity {
        expected: index + 1,
        got: args.len(),
    })?;
    decode_with(value, options).map_err(|source| BuiltinError::Argument { index, source })
}

macro_rules! impl_fn_traits {
    ($arity:expr; $($ty:ident => $idx:tt),*) => {
        impl<F, E, R, $($ty,)*> HostFn<($($ty,)*), R> for F
        where
            F: Fn(&BuiltinContext, $($ty),*) -> Result<R, E> + Send + Sync + 'static,
            E: Into<BoxError>,
            R: Serialize + 'static,
            $($ty: DeserializeOwned + 'static,)*
        {
            fn decl() -> FunctionDecl {
                FunctionDecl::new(vec![$(type_tag_of::<$ty>()),*], Some(type_tag_of::<R>()))
            }

            #[allow(non_snake_case, unused_variables)]
            fn invoke(
                &self,
                ctx: &BuiltinContext,
                args: &[Value],
                options: &ConvertOptions,
            ) -> Result<Value, BuiltinError> {
                check_arity(args, $arity)?;
                $(let $ty: $ty = decode_arg(args, $idx, options)?;)*
                let result = (self)(ctx, $($ty),*).map_err(|e| BuiltinError::Host(e.into()))?;
                encode_with(&result, options).map_err(BuiltinError::Result)
            }
        }

        impl<F, E, $($ty,)*> EffectFn<($($ty,)*)> for F
        where
            F: Fn(&BuiltinContext, $($ty),*) -> Result<(), E> + Send + Sync + 'static,
            E: Into<BoxError>,
            $($ty: DeserializeOwned + 'static,)*
        {
            fn decl() -> FunctionDecl {
                FunctionDecl::new(vec![$(type_tag_of::<$ty>()),*], None)
            }

            #[allow(non_snake_case, unused_variables)]
            fn invoke(
                &self,
                ctx: &BuiltinContext,
                args: &[Value],
                options: &ConvertOptions,
            ) -> Result<Value, BuiltinError> {
                check_arity(args, $arity)?;
                $(let $ty: $ty = decode_arg(args, $idx, options)?;)*
                (self)(ctx, $($ty),*).map_err(|e| BuiltinError::Host(e.into()))?;
                Ok(Value::Null)
            }
        }
    };
}

impl_fn_traits!(0;);
impl_fn_traits!(1; T1 => 0);
impl_fn_traits!(2; T1 => 0, T2 => 1);
impl_fn_traits!(3; T1 => 0, T2 => 1, T3 => 2);
impl_fn_traits!(4; T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_fn_traits!(5; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
