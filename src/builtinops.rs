//! Standard library of host primitives.
//!
//! The interpreter core only knows `define`, `lambda`, `setf!` and `quote`;
//! everything else is supplied by the embedding application. This module is
//! one such supply, compiled in with the `stdlib` feature:
//!
//! ```scheme
//! (+ 1 2.5)                  ; arithmetic, integers promote to reals
//! (< 1 2 3)                  ; chained comparison
//! (if (null? xs) 0 (car xs)) ; only #f is false
//! (echo "total:" (* 6 7))    ; print to standard output
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `not`, `car`)
//! - **Special Forms**: Control evaluation of arguments (e.g., `if`, `begin`)
//!
//! Both kinds live in one registry and are installed into a scope by
//! [`create_global_scope`]. Arity is checked against the registry entry before
//! any operand is evaluated.
//!
//! ## Error Handling
//!
//! - **Type Safety**: Operations reject incorrect types (e.g., `(not 42)` errors)
//! - **No Coercion**: Numbers don't become strings, no "truthiness" conversions
//! - **Overflow Detection**: Integer arithmetic detects and reports overflow

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{NumberType, PspList, Value};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::{
    Applicable, Arity, Scope, SpecialFormFn, StringIter, ValueIter, eval, eval_args,
    eval_sequence,
};

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Receives evaluated arguments through the erased adapter signature
    Function(Rc<OperationFn>),
    /// Receives its operands unevaluated, along with the caller's scope
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// Name the operation is bound under
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Accepted operand counts
    pub arity: Arity,
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }
}

impl Applicable for BuiltinOp {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        self.arity.validate(operands.len())?;
        match &self.op_kind {
            OpKind::Function(func) => func(eval_args(operands, scope)?),
            OpKind::SpecialForm(form) => form(operands, scope),
        }
    }

    fn name(&self) -> &str {
        self.id
    }
}

//
// Numeric tower: integers, promoted to reals when mixed
//

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(NumberType),
    Real(f64),
}

impl Num {
    fn from_value(value: &Value) -> Result<Num, Error> {
        match value {
            Value::Number(n) => Ok(Num::Int(*n)),
            Value::Real(r) => Ok(Num::Real(*r)),
            other => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }

    fn as_real(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(r) => r,
        }
    }

    fn compare(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_real().partial_cmp(&b.as_real()),
        }
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Value {
        match num {
            Num::Int(n) => Value::Number(n),
            Num::Real(r) => Value::Real(r),
        }
    }
}

fn numbers(args: ValueIter<'_>) -> Result<Vec<Num>, Error> {
    args.map(Num::from_value).collect()
}

/// Combine two numbers, using `int_op` when both are integers
fn arith(
    a: Num,
    b: Num,
    int_op: fn(NumberType, NumberType) -> Option<NumberType>,
    real_op: fn(f64, f64) -> f64,
    what: &str,
) -> Result<Num, Error> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y)
            .map(Num::Int)
            .ok_or_else(|| Error::EvalError(format!("Integer overflow in {what}"))),
        (x, y) => finite_real(real_op(x.as_real(), y.as_real()), what),
    }
}

/// Reals that overflow to infinity have no printed form the reader accepts
fn finite_real(r: f64, what: &str) -> Result<Num, Error> {
    if r.is_finite() {
        Ok(Num::Real(r))
    } else {
        Err(Error::EvalError(format!("Real overflow in {what}")))
    }
}

fn builtin_add(args: ValueIter<'_>) -> Result<Num, Error> {
    numbers(args)?.into_iter().try_fold(Num::Int(0), |acc, n| {
        arith(acc, n, NumberType::checked_add, |x, y| x + y, "addition")
    })
}

fn builtin_sub(first: Value, rest: ValueIter<'_>) -> Result<Num, Error> {
    let first = Num::from_value(&first)?;
    let rest = numbers(rest)?;

    if rest.is_empty() {
        return match first {
            Num::Int(n) => n
                .checked_neg()
                .map(Num::Int)
                .ok_or_else(|| Error::EvalError("Integer overflow in negation".into())),
            Num::Real(r) => Ok(Num::Real(-r)),
        };
    }

    rest.into_iter().try_fold(first, |acc, n| {
        arith(acc, n, NumberType::checked_sub, |x, y| x - y, "subtraction")
    })
}

fn builtin_mul(first: Value, rest: ValueIter<'_>) -> Result<Num, Error> {
    numbers(rest)?
        .into_iter()
        .try_fold(Num::from_value(&first)?, |acc, n| {
            arith(acc, n, NumberType::checked_mul, |x, y| x * y, "multiplication")
        })
}

/// Integer division stays integral when exact, otherwise yields a real
fn builtin_div(first: Value, rest: ValueIter<'_>) -> Result<Num, Error> {
    let mut result = Num::from_value(&first)?;
    for divisor in numbers(rest)? {
        if divisor.as_real() == 0.0 {
            return Err(Error::EvalError("Division by zero".into()));
        }
        result = match (result, divisor) {
            (Num::Int(x), Num::Int(y)) => {
                let quotient = x
                    .checked_div(y)
                    .ok_or_else(|| Error::EvalError("Integer overflow in division".into()))?;
                if x % y == 0 {
                    Num::Int(quotient)
                } else {
                    Num::Real(x as f64 / y as f64)
                }
            }
            (x, y) => finite_real(x.as_real() / y.as_real(), "division")?,
        };
    }
    Ok(result)
}

fn builtin_rem(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(Error::EvalError("Division by zero".into()));
    }
    a.checked_rem(b)
        .ok_or_else(|| Error::EvalError("Integer overflow in remainder".into()))
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $($accept:pat_param)|+) => {
        fn $name(first: Value, rest: ValueIter<'_>) -> Result<bool, Error> {
            let mut prev = Num::from_value(&first)?;
            let mut holds = true;
            // Every operand is type-checked even after the chain has failed
            for current in numbers(rest)? {
                holds = holds && matches!(prev.compare(current), $(Some($accept))|+);
                prev = current;
            }
            Ok(holds)
        }
    };
}

numeric_comparison!(builtin_eq, Ordering::Equal);
numeric_comparison!(builtin_lt, Ordering::Less);
numeric_comparison!(builtin_gt, Ordering::Greater);
numeric_comparison!(builtin_le, Ordering::Less | Ordering::Equal);
numeric_comparison!(builtin_ge, Ordering::Greater | Ordering::Equal);

fn builtin_not(b: bool) -> bool {
    !b
}

/// Structural equality; values of different kinds are simply unequal
fn builtin_equal(first: Value, second: Value) -> bool {
    first == second
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::List(args.cloned().collect())
}

fn builtin_car(mut list: ValueIter<'_>) -> Result<Value, Error> {
    match list.next() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::EvalError("car of empty list".into())),
    }
}

fn builtin_cdr(mut list: ValueIter<'_>) -> Result<Value, Error> {
    let Some(_) = list.next() else {
        return Err(Error::EvalError("cdr of empty list".into()));
    };

    Ok(Value::List(list.cloned().collect()))
}

fn builtin_cons(first: Value, rest: Value) -> Result<Value, Error> {
    match rest {
        Value::List(tail) => {
            let list: PspList = std::iter::once(first).chain(tail.iter().cloned()).collect();
            Ok(Value::List(list))
        }
        _ => Err(Error::TypeError(
            "cons requires a list as second argument".to_owned(),
        )),
    }
}

fn builtin_length(value: Value) -> Result<Value, Error> {
    match value {
        Value::List(list) => Ok(Value::from(list.len())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        other => Err(Error::TypeError(format!(
            "length requires a list or string, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_null(value: Value) -> bool {
    value.is_nil()
}

fn builtin_string_append(args: StringIter<'_>) -> String {
    args.collect()
}

/// Render a value for output: strings without quotes, everything else as source
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

fn builtin_error(args: ValueIter<'_>) -> Result<Value, Error> {
    let parts: Vec<String> = args.map(display_text).collect();

    let message = if parts.is_empty() {
        "Error".to_string()
    } else {
        parts.join(" ")
    };

    Err(Error::EvalError(message))
}

fn builtin_echo(args: ValueIter<'_>) -> Value {
    let parts: Vec<String> = args.map(display_text).collect();
    println!("{}", parts.join(" "));
    Value::Unspecified
}

/// `(if test then [else])`: only `#f` selects the else branch
fn eval_if(operands: &[Value], scope: &Scope) -> Result<Value, Error> {
    let (test, then, otherwise) = match operands {
        [test, then] => (test, then, None),
        [test, then, otherwise] => (test, then, Some(otherwise)),
        _ => return Err(Error::arity_error(3, operands.len())),
    };

    match eval(test, scope)? {
        Value::Bool(false) => match otherwise {
            Some(expr) => eval(expr, scope),
            None => Ok(Value::Unspecified),
        },
        _ => eval(then, scope),
    }
}

/// `(begin forms...)`: evaluate in order, yield the last value
fn eval_begin(operands: &[Value], scope: &Scope) -> Result<Value, Error> {
    eval_sequence(operands, scope)
}

fn builtin_fixed<Args, F>(f: F) -> OpKind
where
    F: IntoOperation<Args>,
{
    OpKind::Function(<F as IntoOperation<Args>>::into_operation(f))
}

fn builtin_variadic<Args, F>(f: F) -> OpKind
where
    F: IntoVariadicOperation<Args>,
{
    OpKind::Function(<F as IntoVariadicOperation<Args>>::into_variadic_operation(f))
}

fn builtin_ops() -> Vec<BuiltinOp> {
    fn op(id: &'static str, op_kind: OpKind, arity: Arity) -> BuiltinOp {
        BuiltinOp { id, op_kind, arity }
    }

    vec![
        // Arithmetic
        op("+", builtin_variadic::<(ValueIter<'static>,), _>(builtin_add), Arity::Any),
        op(
            "-",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_sub),
            Arity::AtLeast(1),
        ),
        op(
            "*",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_mul),
            Arity::AtLeast(1),
        ),
        op(
            "/",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_div),
            Arity::AtLeast(2),
        ),
        op(
            "%",
            builtin_fixed::<(NumberType, NumberType), _>(builtin_rem),
            Arity::Exact(2),
        ),
        // Comparison
        op(
            "=",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_eq),
            Arity::AtLeast(2),
        ),
        op(
            "<",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_lt),
            Arity::AtLeast(2),
        ),
        op(
            ">",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_gt),
            Arity::AtLeast(2),
        ),
        op(
            "<=",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_le),
            Arity::AtLeast(2),
        ),
        op(
            ">=",
            builtin_variadic::<(Value, ValueIter<'static>), _>(builtin_ge),
            Arity::AtLeast(2),
        ),
        op(
            "equal?",
            builtin_fixed::<(Value, Value), _>(builtin_equal),
            Arity::Exact(2),
        ),
        // Logic and control
        op("not", builtin_fixed::<(bool,), _>(builtin_not), Arity::Exact(1)),
        op("if", OpKind::SpecialForm(eval_if), Arity::Range(2, 3)),
        op("begin", OpKind::SpecialForm(eval_begin), Arity::Any),
        // Lists
        op("list", builtin_variadic::<(ValueIter<'static>,), _>(builtin_list), Arity::Any),
        op("car", builtin_fixed::<(ValueIter<'static>,), _>(builtin_car), Arity::Exact(1)),
        op("cdr", builtin_fixed::<(ValueIter<'static>,), _>(builtin_cdr), Arity::Exact(1)),
        op("cons", builtin_fixed::<(Value, Value), _>(builtin_cons), Arity::Exact(2)),
        op("length", builtin_fixed::<(Value,), _>(builtin_length), Arity::Exact(1)),
        op("null?", builtin_fixed::<(Value,), _>(builtin_null), Arity::Exact(1)),
        // Strings and output
        op(
            "string-append",
            builtin_variadic::<(StringIter<'static>,), _>(builtin_string_append),
            Arity::Any,
        ),
        op("echo", builtin_variadic::<(ValueIter<'static>,), _>(builtin_echo), Arity::Any),
        op("error", builtin_variadic::<(ValueIter<'static>,), _>(builtin_error), Arity::Any),
    ]
}

thread_local! {
    static BUILTIN_OPS: HashMap<&'static str, Rc<BuiltinOp>> = builtin_ops()
        .into_iter()
        .map(|op| (op.id, Rc::new(op)))
        .collect();
}

/// Find a builtin operation by name
pub fn find_op(id: &str) -> Option<Rc<BuiltinOp>> {
    BUILTIN_OPS.with(|ops| ops.get(id).cloned())
}

/// Names of every builtin operation, sorted
pub fn builtin_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_OPS.with(|ops| ops.keys().copied().collect());
    names.sort_unstable();
    names
}

/// Create a root scope with the core special forms and every builtin bound.
///
/// Each call binds the same registry entries, so `+` in two global scopes
/// created on one thread is the same operation.
pub fn create_global_scope() -> Scope {
    let scope = Scope::with_core_forms();
    BUILTIN_OPS.with(|ops| {
        for (id, op) in ops {
            let op: Rc<dyn Applicable> = op.clone();
            scope.define(*id, Value::Operation(op));
        }
    });
    scope
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::program::Program;

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin function through the registry with evaluated arguments
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_op(name).unwrap();
        op.arity.validate(args.len())?;
        match &op.op_kind {
            OpKind::Function(func) => func(args.to_vec()),
            OpKind::SpecialForm(_) => {
                panic!("expected function builtin in tests, got special form: {name}")
            }
        }
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_ops_registry() {
        let not_op = find_op("not").unwrap();
        assert_eq!(not_op.arity, Arity::Exact(1));
        assert!(!not_op.is_special_form());

        let if_op = find_op("if").unwrap();
        assert!(if_op.is_special_form());
        assert_eq!(if_op.arity, Arity::Range(2, 3));

        assert!(find_op("unknown").is_none());
        // Core forms live in the evaluator, not the registry
        assert!(find_op("define").is_none());

        let names = builtin_names();
        assert!(names.contains(&"string-append"));
        assert!(names.windows(2).all(|w| w[0] < w[1]));

        // Registry entries are shared
        assert!(Rc::ptr_eq(&find_op("+").unwrap(), &find_op("+").unwrap()));
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let int_list = val([1, 2, 3]);
        let nested = val([val([val([1])])]);
        let complex1 = val([val(1), val("test"), val([val(2)])]);
        let complex2 = val([val(1), val("test"), val([val(2)])]);
        let complex3 = val([val(1), val("test"), val([val(3)])]);

        let test_cases: Vec<TestCase> = vec![
            // Addition
            test!("+", &[], success(0)),
            test!("+", &[val(1), val(2), val(3)], success(6)),
            test!("+", &[val(-5), val(10)], success(5)),
            test!("+", &[val(1), val(2.5)], success(3.5)),
            test!("+", &[val(0.5), val(0.25)], success(0.75)),
            test!("+", &[val("not a number")], None),
            test!("+", &[val(1), val(true)], None),
            test!("+", &[val(NumberType::MAX), val(1)], None),
            // Subtraction
            test!("-", &[val(5)], success(-5)),
            test!("-", &[val(2.5)], success(-2.5)),
            test!("-", &[val(10), val(3), val(2)], success(5)),
            test!("-", &[val(1), val(0.5)], success(0.5)),
            test!("-", &[], None),
            test!("-", &[val(5), val(false)], None),
            test!("-", &[val(NumberType::MIN)], None),
            // Multiplication
            test!("*", &[], None),
            test!("*", &[val(5)], success(5)),
            test!("*", &[val(2), val(3), val(4)], success(24)),
            test!("*", &[val(2), val(1.5)], success(3.0)),
            test!("*", &[val(2), nil()], None),
            test!("*", &[val(NumberType::MAX), val(2)], None),
            test!("*", &[val(1e300), val(1e300)], None),
            test!("+", &[val(f64::MAX), val(f64::MAX)], None),
            // Division
            test!("/", &[val(12), val(3)], success(4)),
            test!("/", &[val(7), val(2)], success(3.5)),
            test!("/", &[val(1.0), val(4)], success(0.25)),
            test!("/", &[val(100), val(5), val(2)], success(10)),
            test!("/", &[val(1), val(0)], None),
            test!("/", &[val(1), val(0.0)], None),
            test!("/", &[val(NumberType::MIN), val(-1)], None),
            test!("/", &[val(NumberType::MIN), val(2)], success(NumberType::MIN / 2)),
            test!("/", &[val(-7), val(2)], success(-3.5)),
            test!("/", &[val(1e300), val(1e-300)], None),
            test!("/", &[val(1)], None),
            // Remainder
            test!("%", &[val(7), val(3)], success(1)),
            test!("%", &[val(-7), val(3)], success(-1)),
            test!("%", &[val(7), val(0)], None),
            test!("%", &[val(7.5), val(2)], None),
            // Comparison
            test!("=", &[val(3), val(3)], success(true)),
            test!("=", &[val(3), val(3.0)], success(true)),
            test!("=", &[val(3), val(3), val(4)], success(false)),
            test!("<", &[val(1), val(2), val(3)], success(true)),
            test!("<", &[val(1), val(3), val(2)], success(false)),
            test!("<", &[val(1), val(1.5)], success(true)),
            test!(">", &[val(9), val(6), val(2)], success(true)),
            test!(">", &[val(4), val(4)], success(false)),
            test!("<=", &[val(3), val(3)], success(true)),
            test!(">=", &[val(2), val(6)], success(false)),
            test!("<", &[val(5)], None),
            test!("<", &[val("a"), val(3)], None),
            test!("<", &[val(3), val(1), val("a")], None),
            // Logic
            test!("not", &[val(true)], success(false)),
            test!("not", &[val(false)], success(true)),
            test!("not", &[val(42)], None),
            test!("not", &[], None),
            test!("equal?", &[complex1.clone(), complex2], success(true)),
            test!("equal?", &[complex1, complex3], success(false)),
            test!("equal?", &[val(1), val("1")], success(false)),
            test!("equal?", &[sym("a"), sym("a")], success(true)),
            // Lists
            test!("list", &[], Some(nil())),
            test!("list", &[val(1), val("a")], success([val(1), val("a")])),
            test!("car", std::slice::from_ref(&int_list), success(1)),
            test!("car", std::slice::from_ref(&nested), success([val([1])])),
            test!("car", &[nil()], None),
            test!("car", &[val(1)], None),
            test!("cdr", std::slice::from_ref(&int_list), success([2, 3])),
            test!("cdr", &[val([1])], Some(nil())),
            test!("cdr", &[nil()], None),
            test!("cons", &[val(0), int_list.clone()], success([0, 1, 2, 3])),
            test!("cons", &[val(1), nil()], success([1])),
            test!("cons", &[val(1), val(2)], None),
            test!("length", std::slice::from_ref(&int_list), success(3)),
            test!("length", &[val("héllo")], success(5)),
            test!("length", &[val(5)], None),
            test!("null?", &[nil()], success(true)),
            test!("null?", &[int_list], success(false)),
            test!("null?", &[val(0)], success(false)),
            // Strings
            test!("string-append", &[], success("")),
            test!("string-append", &[val("ab"), val("cd")], success("abcd")),
            test!("string-append", &[val("ab"), val(1)], None),
            test!("error", &[val("boom"), val(1)], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            let case = i + 1;
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "case #{case} ({name}): wrong result");
                }
                (Err(_), None) => {}
                (Ok(actual), None) => {
                    panic!("case #{case} ({name}): expected error, got {actual}")
                }
                (Err(err), Some(expected)) => {
                    panic!("case #{case} ({name}): expected {expected}, got error {err}")
                }
            }
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            call_builtin("error", &[val("bad input:"), val(42), val("x")]),
            Err(Error::EvalError("bad input: 42 x".into()))
        );
        assert_eq!(
            call_builtin("error", &[]),
            Err(Error::EvalError("Error".into()))
        );
    }

    fn run(code: &str) -> Result<Value, Error> {
        let scope = create_global_scope();
        Program::parse(code)?.execute(&scope)
    }

    #[test]
    fn test_special_forms_through_global_scope() {
        let cases: Vec<(&str, Option<Value>)> = vec![
            ("(if #t 1 2)", success(1)),
            ("(if #f 1 2)", success(2)),
            // Only #f is false
            ("(if 0 1 2)", success(1)),
            ("(if () 1 2)", success(1)),
            ("(if \"\" 1 2)", success(1)),
            ("(if #f (error \"not evaluated\") 2)", success(2)),
            ("(if #t 1 (error \"not evaluated\"))", success(1)),
            ("(if #t)", None),
            ("(if #t 1 2 3)", None),
            ("(begin 1 2 3)", success(3)),
            ("(begin (define x 2) (* x x))", success(4)),
            ("(length (list 1 2 3))", success(3)),
            ("(car (cdr '(a b c)))", Some(sym("b"))),
            ("(string-append \"a\" \"b\")", success("ab")),
            ("(undefined-op 1)", None),
        ];

        for (code, expected) in cases {
            match (run(code), expected) {
                (Ok(actual), Some(expected)) => assert_eq!(actual, expected, "{code}"),
                (Err(_), None) => {}
                (result, expected) => panic!("{code}: expected {expected:?}, got {result:?}"),
            }
        }

        assert!(matches!(run("(if #f 1)").unwrap(), Value::Unspecified));
        assert!(matches!(run("(echo \"hi\" 1)").unwrap(), Value::Unspecified));
    }

    #[test]
    fn test_arity_checked_before_operands_evaluated() {
        assert!(matches!(
            run("(not (error \"evaluated\") 1)"),
            Err(Error::ArityError {
                expected: 1,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_recursive_program() {
        let code = "
            (define fact (lambda [n] (if (<= n 1) 1 (* n (fact (- n 1))))))
            (define fib (lambda [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
            (list (fact 10) (fib 15))";
        assert_eq!(run(code).unwrap(), val([3_628_800, 610]));
    }

    #[test]
    fn test_global_scopes_share_operations() {
        let a = create_global_scope();
        let b = create_global_scope();
        assert!(a.lookup("+").unwrap().same_as(&b.lookup("+").unwrap()));
        assert_ne!(a, b);
        assert_eq!(
            a.lookup("car").unwrap().to_string(),
            "#<operation:car>"
        );
    }
}
