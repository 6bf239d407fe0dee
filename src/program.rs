//! A parsed program: the ordered, read-only sequence of top-level forms of one
//! source text.

use std::fmt;
use std::ops::Index;
use std::path::Path;

use log::{debug, trace};

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{Scope, eval};
use crate::reader::{ParseConfig, parse_forms_with_config};

/// Top-level forms of a source text, together with the text itself.
///
/// Parsing is all-or-nothing: a `Program` only exists for source that read
/// completely. Forms can be indexed and iterated but not replaced or removed.
#[derive(Clone)]
pub struct Program {
    code: String,
    file: Option<String>,
    forms: Vec<Value>,
    offsets: Vec<usize>,
}

impl Program {
    pub fn parse(code: impl Into<String>) -> Result<Program, Error> {
        Program::parse_with_config(code, None, &ParseConfig::default())
    }

    /// Parse `code`, labelling any parse error with `file`
    pub fn parse_with_file(code: impl Into<String>, file: &str) -> Result<Program, Error> {
        Program::parse_with_config(code, Some(file), &ParseConfig::default())
    }

    pub fn parse_with_config(
        code: impl Into<String>,
        file: Option<&str>,
        config: &ParseConfig,
    ) -> Result<Program, Error> {
        let code = code.into();
        let (offsets, forms): (Vec<usize>, Vec<Value>) =
            parse_forms_with_config(&code, config, file)?.into_iter().unzip();
        debug!("parsed {} forms from {}", forms.len(), file.unwrap_or("<input>"));
        Ok(Program {
            code,
            file: file.map(str::to_owned),
            forms,
            offsets,
        })
    }

    /// Read and parse a source file; parse errors carry the path as label
    pub fn load(path: impl AsRef<Path>) -> Result<Program, Error> {
        let path = path.as_ref();
        let label = path.display().to_string();
        debug!("loading {label}");
        let code = std::fs::read_to_string(path).map_err(|err| Error::Io {
            path: label.clone(),
            message: err.to_string(),
        })?;
        Program::parse_with_file(code, &label)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.forms.get(index)
    }

    /// Whether `index` addresses a form; negative indices never do
    pub fn has(&self, index: isize) -> bool {
        usize::try_from(index).is_ok_and(|index| index < self.forms.len())
    }

    /// Byte offset in [`Program::code`] where the form at `index` starts
    pub fn offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.forms.iter()
    }

    pub fn forms(&self) -> &[Value] {
        &self.forms
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn set(&self, index: usize, _form: Value) -> Result<(), Error> {
        Err(Error::Unsupported(format!(
            "cannot replace form {index} of a program"
        )))
    }

    pub fn remove(&self, index: usize) -> Result<(), Error> {
        Err(Error::Unsupported(format!(
            "cannot remove form {index} of a program"
        )))
    }

    /// Evaluate every form in order in `scope`.
    ///
    /// Returns the value of the last form, or `Unspecified` for an empty
    /// program. Stops at the first failing form; effects of earlier forms
    /// remain in `scope`.
    pub fn execute(&self, scope: &Scope) -> Result<Value, Error> {
        let mut result = Value::Unspecified;
        for (index, form) in self.forms.iter().enumerate() {
            trace!("executing form {index}: {form}");
            result = eval(form, scope)?;
        }
        Ok(result)
    }
}

impl Index<usize> for Program {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.forms[index]
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.forms.iter()
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("file", &self.file)
            .field("forms", &self.forms)
            .finish()
    }
}

/// Forms separated by single spaces
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, form) in self.forms.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{form}")?;
        }
        Ok(())
    }
}
