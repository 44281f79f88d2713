use std::fmt;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or parsing a log object.
///
/// Line-scoped variants carry the 1-based line number when the failure came
/// from `parse_object`; the single-line constructors leave it as `None`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("object not found: {object_id}")]
    NotFound { object_id: String },

    #[error("permission denied: {object_id}")]
    PermissionDenied { object_id: String },

    #[error("failed to read {object_id}: {source}")]
    Storage {
        object_id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to decompress {object_id}: {source}")]
    Decompression {
        object_id: String,
        #[source]
        source: io::Error,
    },

    #[error("{object_id} is not valid UTF-8: {source}")]
    Encoding {
        object_id: String,
        #[source]
        source: FromUtf8Error,
    },

    #[error("{}malformed line: {fault}", line_prefix(.line))]
    MalformedLine { line: Option<usize>, fault: LineFault },

    #[error("{}invalid JSON: {source}", line_prefix(.line))]
    InvalidJson {
        line: Option<usize>,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}missing field `{field}`", line_prefix(.line))]
    MissingField { line: Option<usize>, field: String },

    #[error("{}invalid value for `{field}`: {source}", line_prefix(.line))]
    InvalidField {
        line: Option<usize>,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a text line could not be mapped onto the positional schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFault {
    TooFewFields { expected: usize, found: usize },
    UnterminatedQuote,
    DanglingEscape,
}

impl fmt::Display for LineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineFault::TooFewFields { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            LineFault::UnterminatedQuote => write!(f, "no closing quotation"),
            LineFault::DanglingEscape => write!(f, "no escaped character"),
        }
    }
}

impl Error {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Error::MissingField {
            line: None,
            field: field.into(),
        }
    }

    pub fn malformed(fault: LineFault) -> Self {
        Error::MalformedLine { line: None, fault }
    }

    /// Attaches a line number to line-scoped errors; other variants pass through.
    pub fn at_line(mut self, number: usize) -> Self {
        match &mut self {
            Error::MalformedLine { line, .. }
            | Error::InvalidJson { line, .. }
            | Error::MissingField { line, .. }
            | Error::InvalidField { line, .. } => *line = Some(number),
            _ => {}
        }
        self
    }

    /// Line number of the offending input, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::MalformedLine { line, .. }
            | Error::InvalidJson { line, .. }
            | Error::MissingField { line, .. }
            | Error::InvalidField { line, .. } => *line,
            _ => None,
        }
    }
}

fn line_prefix(line: &Option<usize>) -> String {
    match line {
        Some(number) => format!("line {number}: "),
        None => String::new(),
    }
}
