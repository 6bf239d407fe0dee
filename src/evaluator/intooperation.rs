use crate::Error;
use crate::ast::{NumberType, Value};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::rc::Rc;

// Adapter layer that turns strongly-typed Rust functions into the erased
// `OperationFn` stored by `PrimitiveFunction`. Hosts normally reach it through
// the `Scope::register_*` methods rather than directly.

/// Canonical erased host function type.
///
/// Host functions receive ownership of their already-evaluated argument
/// vector, so they may consume or rearrange arguments without cloning.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error>;

// =====================================================================
// Fixed-arity argument conversion
// =====================================================================

/// Turns a single evaluated argument into a strongly-typed parameter.
///
/// `Param<'a>` is the parameter type as seen by the host function for a
/// given lifetime of the local argument slots.
pub trait FromParam {
    type Param<'a>;

    /// Convert a single argument into this parameter type, either borrowing
    /// from it (`&str`, iterators) or moving it out (`Value`).
    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Unspecified))
    }
}

// By-value scalar parameters obtained through `TryFrom<Value>` (see `ast.rs`):
// integers, reals and booleans.
impl<T> FromParam for T
where
    Value: TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(value, Value::Unspecified);
        owned.try_into()
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        if let Value::String(s) = value {
            Ok(s.as_str())
        } else {
            Err(Error::TypeError(format!(
                "expected string, got {}",
                value.type_name()
            )))
        }
    }
}

impl<'b, K> FromParam for TypedValueIter<'b, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        if let Value::List(items) = value {
            TypedValueIter::<K>::new(items.as_slice())
        } else {
            Err(Error::TypeError(format!(
                "expected list, got {}",
                value.type_name()
            )))
        }
    }
}

// =====================================================================
// Typed iterators over argument slices
// =====================================================================

/// Describes how to view a `Value` slice as a typed iterator: validate the
/// whole slice up front, then project each element.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project<'a>(v: &'a Value) -> Self::Item<'a>;
}

/// Iterator over a slice of `Value`s, typed by a [`ValueElementKind`].
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.inner.next()?;
        Some(K::project(v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for TypedValueIter<'_, K> where K: ValueElementKind {}
impl<K> FusedIterator for TypedValueIter<'_, K> where K: ValueElementKind {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        v
    }
}

macro_rules! element_kind {
    ($kind:ident, $item:ty, $variant:ident, $expected:literal, |$v:ident| $project:expr) => {
        #[doc(hidden)]
        pub struct $kind;

        impl ValueElementKind for $kind {
            type Item<'a> = $item;

            fn precheck(slice: &[Value]) -> Result<(), Error> {
                match slice.iter().find(|v| !matches!(v, Value::$variant(_))) {
                    Some(other) => Err(Error::TypeError(format!(
                        concat!("expected ", $expected, ", got {}"),
                        other.type_name()
                    ))),
                    None => Ok(()),
                }
            }

            fn project<'a>(v: &'a Value) -> Self::Item<'a> {
                match v {
                    Value::$variant($v) => $project,
                    _ => unreachable!(concat!(stringify!($kind), " invariant violated")),
                }
            }
        }
    };
}

element_kind!(NumberKind, NumberType, Number, "number", |n| *n);
element_kind!(BoolKind, bool, Bool, "boolean", |b| *b);
element_kind!(StringKind, &'a str, String, "string", |s| s.as_str());

/// Borrowed iterator over raw argument values
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over integer arguments, type-checked up front
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Borrowed iterator over boolean arguments, type-checked up front
pub type BoolIter<'a> = TypedValueIter<'a, BoolKind>;

/// Borrowed iterator over string arguments, type-checked up front
pub type StringIter<'a> = TypedValueIter<'a, StringKind>;

// =====================================================================
// Rest parameters
// =====================================================================

/// Builds a rest-parameter value from the tail of the argument list.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation
// =====================================================================

/// Normalizes host function return types to `Result<Value, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Converts a fixed-arity Rust function or closure into an [`OperationFn`],
/// parameterized by its argument tuple type.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Rc<OperationFn>;
}

/// Converts a Rust function whose last parameter is a rest iterator
/// (`ValueIter`, `NumIter`, `BoolIter` or `StringIter`), optionally after a
/// fixed prefix of [`FromParam`] parameters, into an [`OperationFn`].
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Rc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Rc<OperationFn> {
        Rc::new(move |args: Vec<Value>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: R = (self)(rest_param);
            result.into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by one rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Rc<OperationFn> {
                Rc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: R = (self)( $( $p ),+, rest_param );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($prefix, len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);
impl_into_variadic_operation_for_prefix_and_rest!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for one arity: check the count, destructure
/// the owned argument vector into local slots, convert each slot.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Rc<OperationFn> {
                Rc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: R = (self)( $( $p ),+ );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Rc<OperationFn> {
        Rc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }

            let result: R = (self)();
            result.into_value_result()
        })
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
impl_into_operation_for_arity!(4, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4);
