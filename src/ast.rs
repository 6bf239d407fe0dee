//! This module defines the runtime value model shared by the reader and the
//! evaluator. The main enum, [`Value`], is both the syntax tree produced by
//! parsing and the set of first-class runtime values: numbers, strings,
//! booleans, [`Symbol`]s, immutable [`PspList`]s, closures and host operations.
//! Helper functions such as [`val`], [`sym`] and [`nil`] keep tree construction
//! terse in code and tests. `Display` renders re-readable source text for every
//! atom and list.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Index;
use std::rc::Rc;

use crate::Error;
use crate::evaluator::{Applicable, Function};

/// Type alias for integer values in the interpreter
pub type NumberType = i64;

/// Characters that terminate a token
pub(crate) const DELIMITER_CHARS: &str = "()[]{}\";'";

/// Identifier value, equal to another symbol iff the names are equal.
///
/// Cloning shares the name buffer, so symbols are cheap to use as scope keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol(Rc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol(Rc::from(name))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Ordered, fixed-length sequence of values.
///
/// A `PspList` is a value, not a container: it has no mutating methods and
/// clones share storage. [`PspList::set`] and [`PspList::remove`] exist only to
/// reject index mutation with [`Error::Unsupported`].
#[derive(Clone, PartialEq, Default)]
pub struct PspList(Rc<[Value]>);

impl PspList {
    pub fn new(items: Vec<Value>) -> Self {
        PspList(Rc::from(items))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Whether `index` names an element; negative indices never do
    pub fn has(&self, index: isize) -> bool {
        usize::try_from(index).is_ok_and(|i| i < self.len())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn set(&self, index: usize, _value: Value) -> Result<(), Error> {
        Err(Error::Unsupported(format!(
            "cannot assign to index {index} of an immutable list"
        )))
    }

    pub fn remove(&self, index: usize) -> Result<(), Error> {
        Err(Error::Unsupported(format!(
            "cannot remove index {index} of an immutable list"
        )))
    }
}

impl Index<usize> for PspList {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a PspList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Value> for PspList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        PspList(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for PspList {
    fn from(items: Vec<Value>) -> Self {
        PspList::new(items)
    }
}

impl fmt::Debug for PspList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List(")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for PspList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, elem) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{elem}")?;
        }
        write!(f, ")")
    }
}

/// Core value type of the interpreter
///
/// To build a tree, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Integers
    Number(NumberType),
    /// Floating point numbers
    Real(f64),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// Symbols (identifiers)
    Symbol(Symbol),
    /// Lists; the empty list is self-evaluating
    List(PspList),
    /// Closures created by `lambda`
    Function(Rc<Function>),
    /// Special forms and host primitives
    Operation(Rc<dyn Applicable>),
    /// Result of operations evaluated only for their effect (e.g. `echo`)
    /// These values never equal themselves or any other value
    Unspecified,
}

impl Value {
    /// Wrap a special form or host primitive as a value
    pub fn operation(op: impl Applicable + 'static) -> Self {
        Value::Operation(Rc::new(op))
    }

    /// Check if a value represents nil (empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&PspList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Whether both values are the same object.
    ///
    /// Closures and operations compare by pointer; other kinds have no
    /// identity beyond their contents and fall back to structural equality.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Operation(a), Value::Operation(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(&a.0, &b.0) || a == b,
            _ => self == other,
        }
    }

    /// Short name of the value's kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Operation(_) => "operation",
            Value::Unspecified => "unspecified",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Real(r) => write!(f, "Real({r:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::List(list) => write!(f, "{list:?}"),
            Value::Function(func) => {
                write!(f, "Function(params={:?}, body={:?})", func.params(), func.body())
            }
            Value::Operation(op) => write!(f, "Operation({})", op.name()),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<PspList> for Value {
    fn from(list: PspList) -> Self {
        Value::List(list)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(NumberType::try_from(n).unwrap_or(NumberType::MAX))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {}",
                value.type_name()
            )))
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<f64, Error> {
        match value {
            Value::Real(r) => Ok(r),
            Value::Number(n) => Ok(n as f64),
            other => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<bool, Error> {
        if let Value::Bool(b) = value {
            Ok(b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}",
                value.type_name()
            )))
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(Symbol::new(name))
}

/// Helper function for creating Values - works great in mixed lists!
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists (nil)
pub fn nil() -> Value {
    Value::List(PspList::default())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{r:?}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::List(list) => write!(f, "{list}"),
            Value::Function(_) => write!(f, "#<function>"),
            Value::Operation(op) => write!(f, "#<operation:{}>", op.name()),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Closures and operations have identity, not structure
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Operation(a), Value::Operation(b)) => Rc::ptr_eq(a, b),
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // (helper_result, expected_value)
        let test_cases = vec![
            (val(42), Value::Number(42)),
            (val(-17), Value::Number(-17)),
            (val(255u8), Value::Number(255)),
            (val(NumberType::MIN), Value::Number(NumberType::MIN)),
            (val(2.5), Value::Real(2.5)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::String("hello".to_owned())),
            (sym("setf!"), Value::Symbol(Symbol::new("setf!"))),
            (nil(), Value::List(PspList::new(vec![]))),
            (
                val([1, 2, 3]),
                Value::List(PspList::new(vec![
                    Value::Number(1),
                    Value::Number(2),
                    Value::Number(3),
                ])),
            ),
            (
                val(vec![sym("define"), sym("x"), val(42)]),
                Value::List(PspList::new(vec![
                    Value::Symbol("define".into()),
                    Value::Symbol("x".into()),
                    Value::Number(42),
                ])),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_symbol_equality_is_by_name() {
        let a = Symbol::new("lambda");
        let b = Symbol::from(String::from("lambda"));
        assert_eq!(a, b);
        assert_ne!(a, Symbol::new("define"));
        assert_eq!(a.name(), "lambda");

        let mut bindings = std::collections::HashMap::new();
        bindings.insert(a, val(1));
        assert_eq!(bindings.get("lambda"), Some(&val(1)));
    }

    #[test]
    fn test_list_is_read_only() {
        let list = PspList::new(vec![val(1), val(2), val(3)]);
        assert_eq!(list.len(), 3);
        assert!(list.has(0));
        assert!(list.has(2));
        assert!(!list.has(3));
        assert!(!list.has(-1));
        assert_eq!(list[1], val(2));
        assert_eq!(list.get(3), None);

        assert!(matches!(list.set(0, val(9)), Err(Error::Unsupported(_))));
        assert!(matches!(list.remove(0), Err(Error::Unsupported(_))));
        assert_eq!(list[0], val(1));
    }

    #[test]
    fn test_display_renders_source() {
        let test_cases = vec![
            (val(42), "42"),
            (val(-3.5), "-3.5"),
            (val(3.0), "3.0"),
            (val(false), "#f"),
            (val("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\""),
            (nil(), "()"),
            (
                val(vec![sym("lambda"), val(vec![sym("a")]), val(vec![nil()])]),
                "(lambda (a) (()))",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.to_string(), expected);
        }
    }

    #[test]
    fn test_debug_escapes_strings() {
        let test_cases = vec![
            (val("plain"), r#"String("plain")"#),
            (val("a\"b\n"), r#"String("a\"b\n")"#),
            (val(vec![val("x y")]), r#"List(String("x y"))"#),
        ];

        for (value, expected) in test_cases {
            assert_eq!(format!("{value:?}"), expected);
        }
    }

    #[test]
    fn test_unspecified_values() {
        let unspec = Value::Unspecified;
        assert_ne!(unspec, unspec);
        assert_ne!(unspec, Value::Unspecified);
        assert_ne!(unspec, val(42));
    }

    #[test]
    fn test_primitive_conversions() {
        assert_eq!(NumberType::try_from(val(7)), Ok(7));
        assert_eq!(f64::try_from(val(7)), Ok(7.0));
        assert_eq!(bool::try_from(val(true)), Ok(true));
        assert!(matches!(
            NumberType::try_from(val("7")),
            Err(Error::TypeError(_))
        ));
    }
}
