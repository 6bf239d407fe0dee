//! Scope chain, evaluation and the core special forms.
//!
//! Evaluation dispatches on the value variant: symbols are looked up through
//! the [`Scope`] chain, non-empty lists apply their operator to the remaining
//! elements, and everything else (including the empty list) evaluates to
//! itself. Operands reach an [`Applicable`] unevaluated; special forms such as
//! `define` decide what to evaluate, while [`Function`]s and
//! [`PrimitiveFunction`]s evaluate every operand first.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::trace;

use crate::Error;
use crate::ast::{PspList, Symbol, Value};

pub mod intooperation;

pub use intooperation::{BoolIter, NumIter, OperationFn, StringIter, ValueIter};
use intooperation::{IntoOperation, IntoVariadicOperation};

/// Uniform capability of everything that can sit in operator position.
///
/// `operands` are the unevaluated forms following the operator; each
/// implementation chooses whether and when to evaluate them in `scope`.
pub trait Applicable {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error>;

    /// Name used when printing the operation
    fn name(&self) -> &str;
}

/// Accepted argument counts of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if got != n => Err(Error::arity_error(n, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(min, _) if got < min => Err(Error::arity_error(min, got)),
            Arity::Range(_, max) if got > max => Err(Error::arity_error(max, got)),
            _ => Ok(()),
        }
    }
}

struct Frame {
    bindings: RefCell<HashMap<Symbol, Value>>,
    parent: Option<Scope>,
}

/// One level of the lexical environment, linked to its parent.
///
/// Cloning a `Scope` yields another handle to the same frame, so a closure's
/// captured scope observes later `define`/`setf!` on any frame in its chain.
#[derive(Clone)]
pub struct Scope(Rc<Frame>);

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    /// Create an empty root scope
    pub fn new() -> Self {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// Create a root scope with `define`, `lambda`, `setf!` and `quote` bound
    pub fn with_core_forms() -> Self {
        let scope = Scope::new();
        scope.define_operation("define", Define);
        scope.define_operation("lambda", Lambda);
        scope.define_operation("setf!", Setf);
        scope.define_operation("quote", Quote);
        scope
    }

    /// Create a fresh frame whose parent is this scope
    pub fn child(&self) -> Scope {
        Scope(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.0.parent.as_ref()
    }

    /// Find the nearest binding of `name`, searching outward through the chain
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            scope = scope.parent()?;
        }
    }

    /// Like [`Scope::get`], failing with [`Error::UnboundSymbol`]
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    /// Whether `name` is bound anywhere in the chain
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether `name` is bound in this frame itself
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    /// Bind `name` in this frame, shadowing any outer binding
    pub fn define(&self, name: impl Into<Symbol>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Overwrite the nearest existing binding of `name`.
    ///
    /// Fails with [`Error::UnboundSymbol`] when no frame in the chain binds it;
    /// unlike [`Scope::define`] this never creates a binding.
    pub fn assign(&self, name: &Symbol, value: Value) -> Result<Value, Error> {
        let mut scope = self;
        loop {
            if let Some(slot) = scope.0.bindings.borrow_mut().get_mut(name.name()) {
                *slot = value.clone();
                return Ok(value);
            }
            scope = scope
                .parent()
                .ok_or_else(|| Error::UnboundSymbol(name.name().to_owned()))?;
        }
    }

    /// Bind a special form or host primitive under `name`
    pub fn define_operation(&self, name: &str, op: impl Applicable + 'static) {
        self.define(name, Value::operation(op));
    }

    /// Register a host function that works on already-evaluated arguments.
    ///
    /// This is the low-level API; the typed
    /// [`Scope::register_builtin_operation`] is usually more convenient.
    ///
    /// # Example
    /// ```
    /// use psp::ast::Value;
    /// use psp::evaluator::Scope;
    /// use psp::Error;
    ///
    /// fn count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::from(args.len()))
    /// }
    ///
    /// let scope = Scope::new();
    /// scope.register_builtin_function("count", count);
    /// // Now (count 1 2 3) evaluates to 3
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        self.define_operation(
            name,
            PrimitiveFunction::from_rc(name, Rc::new(move |args: Vec<Value>| func(&args))),
        );
    }

    /// Register a strongly-typed Rust function as a host primitive.
    ///
    /// ```rust,ignore
    /// fn add(a: i64, b: i64) -> i64 { a + b }
    /// scope.register_builtin_operation::<_, (i64, i64)>("add", add);
    /// ```
    ///
    /// Supported parameter types are `i64`, `f64`, `bool`, `&str`, `Value`
    /// and the list iterators `ValueIter`, `NumIter`, `BoolIter` and
    /// `StringIter`. The return type is anything `Into<Value>`, or
    /// `Result<R, Error>` of such a type. Arity is enforced from the
    /// signature and conversion failures yield [`Error::TypeError`].
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        self.define_operation(name, PrimitiveFunction::from_rc(name, func.into_operation()));
    }

    /// Register a host primitive whose last parameter is a rest iterator.
    ///
    /// The [`Arity`] is checked against the total argument count before the
    /// function runs, since variadic minimums are not derivable from the
    /// signature alone.
    pub fn register_variadic_builtin_operation<F, Args>(
        &self,
        name: &str,
        arity: Arity,
        func: F,
    ) where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let wrapped = Rc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.define_operation(name, PrimitiveFunction::from_rc(name, wrapped));
    }

    /// Get all bindings in this scope and its parents, inner frames shadowing
    /// outer ones, sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        if let Some(parent) = self.parent() {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in self.0.bindings.borrow().iter() {
            bindings.insert(name.name().to_owned(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .0
            .bindings
            .borrow()
            .keys()
            .map(|name| name.name().to_owned())
            .collect();
        names.sort();
        f.debug_struct("Scope")
            .field("bindings", &names)
            .field("parent", &self.0.parent)
            .finish()
    }
}

/// Evaluate a form in `scope`
pub fn eval(expr: &Value, scope: &Scope) -> Result<Value, Error> {
    match expr {
        Value::Number(_)
        | Value::Real(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Function(_)
        | Value::Operation(_)
        | Value::Unspecified => Ok(expr.clone()),

        Value::Symbol(name) => scope.lookup(name.name()),

        Value::List(list) => match list.as_slice() {
            [] => Ok(expr.clone()),
            [operator, operands @ ..] => {
                let op = eval(operator, scope)?;
                apply(&op, scope, operands).map_err(|err| add_context(err, expr))
            }
        },
    }
}

/// Apply an operator value to unevaluated operand forms
pub fn apply(op: &Value, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
    match op {
        Value::Operation(op) => op.apply(scope, operands),
        Value::Function(func) => func.apply(scope, operands),
        other => Err(Error::TypeError(format!(
            "Cannot apply non-function: {other}"
        ))),
    }
}

/// Evaluate each form in order, returning the last result
pub fn eval_sequence(forms: &[Value], scope: &Scope) -> Result<Value, Error> {
    let mut result = Value::Unspecified;
    for form in forms {
        result = eval(form, scope)?;
    }
    Ok(result)
}

/// Evaluate operand forms left to right
pub fn eval_args(args: &[Value], scope: &Scope) -> Result<Vec<Value>, Error> {
    args.iter().map(|arg| eval(arg, scope)).collect()
}

/// Helper function to add expression context to errors
fn add_context(error: Error, expr: &Value) -> Error {
    let context = format!("while evaluating: {expr}");
    match error {
        Error::EvalError(msg) if !msg.contains("\n  Context: ") => {
            Error::EvalError(format!("{msg}\n  Context: {context}"))
        }
        Error::TypeError(msg) if !msg.contains("\n  Context: ") => {
            Error::TypeError(format!("{msg}\n  Context: {context}"))
        }
        // Unbound symbols, arity and form errors carry their own context
        other => other,
    }
}

/// A closure: parameter list and body paired with the scope it was created in
pub struct Function {
    params: Vec<Symbol>,
    body: Vec<Value>,
    scope: Scope,
}

impl Function {
    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// Call with already-evaluated arguments.
    ///
    /// Parameters are bound in a fresh child of the captured scope, so the
    /// captured frame itself is never modified by a call.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        if self.params.len() != args.len() {
            return Err(Error::arity_error(self.params.len(), args.len()));
        }

        let frame = self.scope.child();
        for (param, arg) in self.params.iter().zip(args) {
            frame.define(param.clone(), arg);
        }

        eval_sequence(&self.body, &frame)
    }
}

impl Applicable for Function {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        let args = eval_args(operands, scope)?;
        self.call(args)
    }

    fn name(&self) -> &str {
        "lambda"
    }
}

/// A host function over evaluated arguments.
///
/// This is the ordinary-function counterpart of a special form: every operand
/// is evaluated in the caller's scope before the Rust function runs.
pub struct PrimitiveFunction {
    id: String,
    func: Rc<OperationFn>,
}

impl PrimitiveFunction {
    pub fn new(
        id: impl Into<String>,
        func: impl Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    ) -> Self {
        Self::from_rc(id, Rc::new(func))
    }

    pub(crate) fn from_rc(id: impl Into<String>, func: Rc<OperationFn>) -> Self {
        PrimitiveFunction {
            id: id.into(),
            func,
        }
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        (self.func)(args)
    }
}

impl Applicable for PrimitiveFunction {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        let args = eval_args(operands, scope)?;
        self.call(args)
    }

    fn name(&self) -> &str {
        &self.id
    }
}

/// Signature of a special form implemented as a plain function
pub type SpecialFormFn = fn(&[Value], &Scope) -> Result<Value, Error>;

/// A special form backed by a function pointer; it receives its operands
/// unevaluated.
pub struct SpecialForm {
    id: &'static str,
    func: SpecialFormFn,
}

impl SpecialForm {
    pub const fn new(id: &'static str, func: SpecialFormFn) -> Self {
        SpecialForm { id, func }
    }
}

impl Applicable for SpecialForm {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        (self.func)(operands, scope)
    }

    fn name(&self) -> &str {
        self.id
    }
}

/// `(define name value)`: evaluate `value`, bind it in the current frame
pub struct Define;

impl Applicable for Define {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        match operands {
            [Value::Symbol(name), expr] => {
                let value = eval(expr, scope)?;
                trace!("define {name} = {value}");
                scope.define(name.clone(), value.clone());
                Ok(value)
            }
            [_, _] => Err(Error::MalformedForm(
                "first operand of define form must be symbol".to_owned(),
            )),
            _ => Err(Error::MalformedForm(format!(
                "define expects 2 operands, got {}",
                operands.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        "define"
    }
}

/// `(setf! name value)`: evaluate `value`, overwrite the nearest existing
/// binding of `name`
pub struct Setf;

impl Applicable for Setf {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        match operands {
            [Value::Symbol(name), expr] => {
                let value = eval(expr, scope)?;
                trace!("setf! {name} = {value}");
                scope.assign(name, value)
            }
            [_, _] => Err(Error::MalformedForm(
                "first operand of setf! form must be symbol".to_owned(),
            )),
            _ => Err(Error::MalformedForm(format!(
                "setf! expects 2 operands, got {}",
                operands.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        "setf!"
    }
}

/// `(lambda [params...] body...)`: capture the current scope in a [`Function`]
pub struct Lambda;

impl Applicable for Lambda {
    fn apply(&self, scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        match operands {
            [Value::List(param_list), body @ ..] => {
                let params = lambda_params(param_list)?;
                Ok(Value::Function(Rc::new(Function {
                    params,
                    body: body.to_vec(),
                    scope: scope.clone(),
                })))
            }
            [_, ..] => Err(Error::MalformedForm(
                "lambda parameters must be a list".to_owned(),
            )),
            [] => Err(Error::MalformedForm(
                "lambda requires a parameter list".to_owned(),
            )),
        }
    }

    fn name(&self) -> &str {
        "lambda"
    }
}

fn lambda_params(param_list: &PspList) -> Result<Vec<Symbol>, Error> {
    let mut params: Vec<Symbol> = Vec::with_capacity(param_list.len());
    for param in param_list {
        match param {
            Value::Symbol(name) => {
                if params.contains(name) {
                    return Err(Error::MalformedForm(format!(
                        "duplicate lambda parameter: {name}"
                    )));
                }
                params.push(name.clone());
            }
            other => {
                return Err(Error::MalformedForm(format!(
                    "lambda parameters must be symbols, got {other}"
                )));
            }
        }
    }
    Ok(params)
}

/// `(quote form)`: return `form` unevaluated
pub struct Quote;

impl Applicable for Quote {
    fn apply(&self, _scope: &Scope, operands: &[Value]) -> Result<Value, Error> {
        match operands {
            [expr] => Ok(expr.clone()),
            _ => Err(Error::MalformedForm(format!(
                "quote expects 1 operand, got {}",
                operands.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        "quote"
    }
}
