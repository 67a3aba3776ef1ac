use std::fmt;

use thiserror::Error;

/// Source line a parse error points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line_no: usize,
    pub text: String,
}

impl Location {
    pub fn new(line_no: usize, text: &str) -> Self {
        Self {
            line_no,
            text: text.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: '{}'", self.line_no, self.text)
    }
}

/// Malformed `{...}` syntax. Positions are byte offsets into the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("expected '}}' at the end of the line")]
    ExpectedClose,
    #[error("nested templates are not supported; pos: {0}")]
    Nested(usize),
    #[error("only one variable name allowed in template braces; pos: {0}")]
    MultipleNames(usize),
    #[error("template braces must contain a variable name; pos: {0}")]
    MissingName(usize),
    #[error("only one tag allowed in template braces; pos: {0}")]
    MultipleTags(usize),
    #[error("expected tag name; pos: {0}")]
    MissingTag(usize),
    #[error("there is no '{{' for '}}'; pos: {0}")]
    UnmatchedClose(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionErrorKind {
    #[error("variable redefinition: '{0}'")]
    Redefinition(String),
    #[error("there is no '\"' pair for '\"'; pos: {0}")]
    UnterminatedQuote(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{kind}; {at}")]
    Tokenize { kind: TokenizeError, at: Location },
    #[error("fail rule matching; ':' not found at pos {pos}; {at}")]
    Header { pos: usize, at: Location },
    #[error("the command is not in a rule scope; {at}")]
    Scope { at: Location },
    #[error("{kind}; {at}")]
    Definition {
        kind: DefinitionErrorKind,
        at: Location,
    },
    #[error("'{name}' is not defined; rule: '{rule}'")]
    Reference { name: String, rule: String },
    #[error("value counts for tag '{tag}' are not equal ({expected} vs {found} of '{name}'); rule: '{rule}'")]
    TagConsistency {
        tag: String,
        name: String,
        expected: usize,
        found: usize,
        rule: String,
    },
}

impl Error {
    pub fn tokenize(kind: TokenizeError, at: &Location) -> Self {
        Error::Tokenize {
            kind,
            at: at.clone(),
        }
    }
}
