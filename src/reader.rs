//! Source text to forms.
//!
//! The reader is a recursive-descent parser built from `nom` primitives. It
//! performs no evaluation and no symbol resolution: it only assembles
//! [`PspList`]s, [`Symbol`]s and literals. `()`, `[]` and `{}` all build the same
//! list, but a list must be closed by the partner of the delimiter that opened it.
//!
//! Failures are reported as a [`ParseError`] holding the byte offset of the
//! character at which the problem was detected.

use log::debug;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1, one_of},
    combinator::recognize,
    error::ErrorKind,
    multi::many0,
    sequence::pair,
};

use crate::ast::{DELIMITER_CHARS, NumberType, PspList, Symbol, Value};
use crate::{Error, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, PartialEq)]
pub struct ParseConfig {
    /// Skip `;` line comments
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// nom error carrying the kind of problem and where it was detected
#[derive(Debug, PartialEq)]
struct ReadError<'a> {
    input: &'a str,
    kind: ParseErrorKind,
}

impl<'a> nom::error::ParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        let kind = match kind {
            ErrorKind::Eof => ParseErrorKind::Incomplete,
            _ => ParseErrorKind::InvalidToken,
        };
        ReadError { input, kind }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type ReadResult<'a, T> = IResult<&'a str, T, ReadError<'a>>;

/// Abort the whole parse; no alternative can recover from these
fn fail<T>(input: &str, kind: ParseErrorKind) -> ReadResult<'_, T> {
    Err(nom::Err::Failure(ReadError { input, kind }))
}

fn closing_partner(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn is_token_char(c: char) -> bool {
    !c.is_whitespace() && !DELIMITER_CHARS.contains(c)
}

/// Skip whitespace and, when enabled, `;` comments
fn skip_atmosphere<'a>(input: &'a str, config: &ParseConfig) -> ReadResult<'a, ()> {
    let (input, _) = if config.handle_comments {
        many0(alt((
            multispace1,
            recognize(pair(char(';'), take_while(|c: char| c != '\n'))),
        )))
        .parse(input)?
    } else {
        many0(multispace1).parse(input)?
    };
    Ok((input, ()))
}

/// Whether a token is meant to be a number: a digit, optionally after a sign
/// or a leading decimal point
fn looks_numeric(token: &str) -> bool {
    let unsigned = token.strip_prefix(['-', '+']).unwrap_or(token);
    let unsigned = unsigned.strip_prefix('.').unwrap_or(unsigned);
    unsigned.starts_with(|c: char| c.is_ascii_digit())
}

/// Parse a bare token: number, boolean or symbol
fn parse_atom(input: &str) -> ReadResult<'_, Value> {
    let (remaining, token) = take_while1(is_token_char).parse(input)?;

    if looks_numeric(token) {
        if let Ok(n) = token.parse::<NumberType>() {
            return Ok((remaining, Value::Number(n)));
        }
        if token.contains(['.', 'e', 'E'])
            && let Ok(r) = token.parse::<f64>()
            && r.is_finite()
        {
            return Ok((remaining, Value::Real(r)));
        }
        return fail(input, ParseErrorKind::InvalidToken);
    }

    match token {
        "#t" => Ok((remaining, Value::Bool(true))),
        "#f" => Ok((remaining, Value::Bool(false))),
        _ if token.starts_with('#') => fail(input, ParseErrorKind::InvalidToken),
        _ => Ok((remaining, Value::Symbol(Symbol::new(token)))),
    }
}

/// Parse a string literal
fn parse_string(input: &str) -> ReadResult<'_, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(chars))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    Some(_) => return fail(remaining, ParseErrorKind::InvalidToken),
                    None => return fail(char_iter.as_str(), ParseErrorKind::Incomplete),
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            // Unterminated string
            None => return fail(remaining, ParseErrorKind::Incomplete),
        }
    }
}

/// Parse a list opened by any bracket family
fn parse_list<'a>(input: &'a str, config: &ParseConfig) -> ReadResult<'a, Value> {
    let (mut remaining, open) = one_of("([{").parse(input)?;
    let close = closing_partner(open);
    let mut elements = Vec::new();

    loop {
        let (rest, _) = skip_atmosphere(remaining, config)?;
        match rest.chars().next() {
            None => return fail(rest, ParseErrorKind::Incomplete),
            Some(c) if c == close => {
                return Ok((&rest[c.len_utf8()..], Value::List(PspList::new(elements))));
            }
            Some(')' | ']' | '}') => return fail(rest, ParseErrorKind::MismatchedDelimiter),
            Some(_) => {
                let (rest, element) = parse_form(rest, config)?;
                elements.push(element);
                remaining = rest;
            }
        }
    }
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote<'a>(input: &'a str, config: &ParseConfig) -> ReadResult<'a, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, _) = skip_atmosphere(input, config)?;
    if input.is_empty() {
        return fail(input, ParseErrorKind::Incomplete);
    }
    let (input, quoted) = parse_form(input, config)?;
    Ok((
        input,
        Value::List(PspList::new(vec![Value::Symbol(Symbol::new("quote")), quoted])),
    ))
}

/// Parse one form starting exactly at `input`
fn parse_form<'a>(input: &'a str, config: &ParseConfig) -> ReadResult<'a, Value> {
    match input.chars().next() {
        None => fail(input, ParseErrorKind::Incomplete),
        Some('(' | '[' | '{') => parse_list(input, config),
        Some(')' | ']' | '}') => fail(input, ParseErrorKind::UnexpectedDelimiter),
        Some('"') => parse_string(input),
        Some('\'') => parse_quote(input, config),
        // Only reachable with comment handling disabled
        Some(';') => fail(input, ParseErrorKind::InvalidToken),
        Some(_) => parse_atom(input),
    }
}

fn parse_top_level<'a>(
    code: &'a str,
    config: &ParseConfig,
    forms: &mut Vec<(usize, Value)>,
) -> ReadResult<'a, ()> {
    let mut input = code;
    loop {
        let (rest, _) = skip_atmosphere(input, config)?;
        if rest.is_empty() {
            return Ok((rest, ()));
        }
        let (after, form) = parse_form(rest, config)?;
        forms.push((code.len() - rest.len(), form));
        input = after;
    }
}

/// Parse every top-level form of `code`, paired with the byte offset at which
/// each form begins.
pub fn parse_forms_with_config(
    code: &str,
    config: &ParseConfig,
    file: Option<&str>,
) -> Result<Vec<(usize, Value)>, ParseError> {
    let mut forms = Vec::new();
    let (kind, offset) = match parse_top_level(code, config, &mut forms) {
        Ok(_) => return Ok(forms),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => (e.kind, code.len() - e.input.len()),
        Err(nom::Err::Incomplete(_)) => (ParseErrorKind::Incomplete, code.len()),
    };
    debug!("{kind} at byte {offset}");
    Err(ParseError::new(kind, code, offset, file.map(str::to_owned)))
}

/// Parse every top-level form of `code` with the default configuration.
pub fn parse_forms(code: &str) -> Result<Vec<Value>, Error> {
    let forms = parse_forms_with_config(code, &ParseConfig::default(), None)?;
    Ok(forms.into_iter().map(|(_, form)| form).collect())
}
