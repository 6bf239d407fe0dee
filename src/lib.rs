//! Psp - an embeddable interpreter for a small Lisp dialect
//!
//! This crate reads Lisp source text into nested list forms and evaluates them
//! against a chain of lexical scopes. The host application supplies its own
//! primitive operations (arithmetic, I/O, control forms) through the same
//! [`evaluator::Applicable`] protocol that the built-in special forms use.
//!
//! ```scheme
//! (define add +)
//! (define sub (lambda [a b] {- a b}))
//! (echo (sub (add 5 7) 3))
//! ```
//!
//! The three bracket families `()`, `[]` and `{}` are interchangeable list
//! delimiters, so nesting can be made visually distinct without changing meaning.
//!
//! ## Embedding
//!
//! ```
//! use psp::evaluator::Scope;
//! use psp::program::Program;
//!
//! let scope = Scope::with_core_forms();
//! let program = Program::parse("(define x 42) (define y x)").unwrap();
//! program.execute(&scope).unwrap();
//! assert_eq!(scope.lookup("y").unwrap(), psp::ast::Value::Number(42));
//! ```
//!
//! ## Modules
//!
//! - `ast`: runtime values, symbols and immutable lists
//! - `reader`: source text to forms, with byte offsets for diagnostics
//! - `program`: a parsed, read-only sequence of top-level forms
//! - `evaluator`: scope chain, evaluation and the core special forms
//! - `builtinops`: the optional standard library of host primitives

use thiserror::Error;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum ParseErrorKind {
    /// Input ended before a list or string was closed
    #[error("unexpected end of input")]
    Incomplete,
    /// A list was closed with a delimiter from a different bracket family
    #[error("mismatched delimiter")]
    MismatchedDelimiter,
    /// A closing delimiter with no list open
    #[error("unexpected closing delimiter")]
    UnexpectedDelimiter,
    /// A token that is neither a number, string, boolean nor valid symbol
    #[error("invalid token")]
    InvalidToken,
}

/// A parsing failure located by byte offset in the original source.
///
/// Line and column are never stored: [`ParseError::line`] and
/// [`ParseError::column`] derive them from `code` and `offset` on each call, so
/// building the error costs nothing beyond capturing the offset.
#[derive(Debug, PartialEq, Clone, Error)]
#[error("parsing error on {}", location(self))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// The full source text that was being parsed
    pub code: String,
    /// Byte offset at which the problem was detected
    pub offset: usize,
    /// Optional label of the file the source came from
    pub file: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        code: impl Into<String>,
        offset: usize,
        file: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            code: code.into(),
            offset,
            file,
        }
    }

    /// The file label, empty when the source did not come from a file
    pub fn file(&self) -> &str {
        self.file.as_deref().unwrap_or("")
    }

    /// 1-based line of `offset`
    pub fn line(&self) -> usize {
        if self.offset == 0 {
            return 1;
        }
        let prefix = &self.code.as_bytes()[..self.clamped_offset()];
        prefix.iter().filter(|&&b| b == b'\n').count() + 1
    }

    /// 1-based column of `offset`, counted in bytes from the preceding newline
    pub fn column(&self) -> usize {
        let end = self.clamped_offset();
        match self.code.as_bytes()[..end].iter().rposition(|&b| b == b'\n') {
            Some(newline) => self.offset - newline,
            None => self.offset + 1,
        }
    }

    fn clamped_offset(&self) -> usize {
        self.offset.min(self.code.len())
    }
}

/// `file:line:column`, or `line:column` when there is no file label
fn location(err: &ParseError) -> String {
    match err.file.as_deref().filter(|file| !file.is_empty()) {
        Some(file) => format!("{file}:{}:{}", err.line(), err.column()),
        None => format!("{}:{}", err.line(), err.column()),
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),
    #[error("Malformed special form: {0}")]
    MalformedForm(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("{}", arity_message(*expected, *got, expression.as_deref()))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
}

fn arity_message(expected: usize, got: usize, expression: Option<&str>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityError: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityError: function expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

pub mod ast;
pub mod evaluator;
pub mod program;
pub mod reader;

#[cfg(feature = "stdlib")]
pub mod builtinops;

#[cfg(test)]
mod tests {
    use super::*;

    fn error_at(code: &str, offset: usize) -> ParseError {
        ParseError::new(ParseErrorKind::InvalidToken, code, offset, None)
    }

    #[test]
    fn test_line_and_column_mapping() {
        // (code, offset, line, column)
        let test_cases = vec![
            ("", 0, 1, 1),
            ("abc", 0, 1, 1),
            ("abc", 2, 1, 3),
            ("a\nbc", 1, 1, 2),
            ("a\nbc", 2, 2, 1),
            ("a\nbc", 3, 2, 2),
            ("a\n\n\nb", 4, 4, 1),
            ("(define x\n  (foo]", 16, 2, 7),
        ];

        for (i, (code, offset, line, column)) in test_cases.into_iter().enumerate() {
            let err = error_at(code, offset);
            assert_eq!(err.line(), line, "case #{}: line of {code:?}@{offset}", i + 1);
            assert_eq!(err.column(), column, "case #{}: column of {code:?}@{offset}", i + 1);
        }
    }

    #[test]
    fn test_offset_past_end_is_clamped() {
        let err = error_at("ab\ncd", 99);
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 97);
    }

    #[test]
    fn test_parse_error_message() {
        let err = error_at("a\nbc", 3);
        assert_eq!(err.to_string(), "parsing error on 2:2");
        assert_eq!(err.file(), "");

        let labelled = ParseError::new(
            ParseErrorKind::Incomplete,
            "(a",
            2,
            Some("sample.psp".to_owned()),
        );
        assert_eq!(labelled.to_string(), "parsing error on sample.psp:1:3");
        assert_eq!(labelled.file(), "sample.psp");

        let unlabelled =
            ParseError::new(ParseErrorKind::Incomplete, "(a", 2, Some(String::new()));
        assert_eq!(unlabelled.to_string(), "parsing error on 1:3");

        let wrapped: Error = labelled.into();
        assert_eq!(wrapped.to_string(), "parsing error on sample.psp:1:3");
    }

    #[test]
    fn test_parse_error_kind_display() {
        use std::error::Error as _;

        let test_cases = vec![
            (ParseErrorKind::Incomplete, "unexpected end of input"),
            (ParseErrorKind::MismatchedDelimiter, "mismatched delimiter"),
            (ParseErrorKind::UnexpectedDelimiter, "unexpected closing delimiter"),
            (ParseErrorKind::InvalidToken, "invalid token"),
        ];
        for (kind, text) in test_cases {
            assert_eq!(kind.to_string(), text);
        }
        assert!(error_at("x", 0).source().is_none());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::UnboundSymbol("x".into()).to_string(),
            "Unbound symbol: x"
        );
        assert_eq!(
            Error::arity_error(2, 3).to_string(),
            "ArityError: function expected 2 arguments but got 3"
        );
        assert_eq!(
            Error::arity_error_with_expr(1, 0, "(f)".into()).to_string(),
            "ArityError: expression (f): expected 1 arguments, got 0"
        );
    }
}
