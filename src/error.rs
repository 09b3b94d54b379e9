use std::fmt;
use thiserror::Error;

/// A 0-based position in the source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 0-based line number
    pub line: usize,
    /// 0-based column (byte offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

impl Position {
    /// Compute the line/column of `offset` within `input`.
    pub fn locate(input: &[u8], offset: usize) -> Position {
        let offset = offset.min(input.len());
        let consumed = &input[..offset];
        let line = consumed.iter().filter(|&&b| b == b'\n').count();
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        Position {
            line,
            column: offset - line_start,
            offset,
        }
    }
}

pub const LEXICAL_ERROR: &str = "ddl-lexical-error";
pub const SYNTAX_ERROR: &str = "ddl-syntax-error";

/// A fatal OpenDDL parse error with span information (begin..end).
#[derive(Debug, Clone, PartialEq)]
pub struct DdlError {
    pub code: &'static str,
    pub message: String,
    /// Start of the offending region
    pub begin: Position,
    /// End of the offending region (exclusive)
    pub end: Position,
}

impl DdlError {
    /// Malformed token: comment, string, number, name.
    pub fn lexical(message: String, begin: Position, end: Position) -> Self {
        DdlError {
            code: LEXICAL_ERROR,
            message,
            begin,
            end,
        }
    }

    /// Grammar violation: missing brace, wrong row width, unknown keyword.
    pub fn syntax(message: String, begin: Position, end: Position) -> Self {
        DdlError {
            code: SYNTAX_ERROR,
            message,
            begin,
            end,
        }
    }

    pub fn is_lexical(&self) -> bool {
        self.code == LEXICAL_ERROR
    }
}

impl fmt::Display for DdlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(
                f,
                "{}:{}: {} ({})",
                self.begin.line, self.begin.column, self.message, self.code
            )
        } else {
            write!(
                f,
                "{}:{}-{}:{}: {} ({})",
                self.begin.line,
                self.begin.column,
                self.end.line,
                self.end.column,
                self.message,
                self.code
            )
        }
    }
}

impl std::error::Error for DdlError {}

/// A non-fatal error found while interpreting an OpenGEX document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("parse failed: {0}")]
    Parse(#[from] DdlError),

    /// Grammar or value violation inside one structure.
    #[error("{identifier}{}: {message}", display_name(.name))]
    Structure {
        identifier: String,
        name: Option<String>,
        message: String,
    },

    /// A `%name`/`$name` reference that does not lead to a usable structure.
    #[error("{identifier}: unresolved reference {reference}")]
    UnresolvedReference {
        identifier: String,
        reference: String,
    },
}

fn display_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" {}", name),
        None => String::new(),
    }
}

impl ImportError {
    pub fn structure(identifier: impl Into<String>, name: Option<&str>, message: String) -> Self {
        ImportError::Structure {
            identifier: identifier.into(),
            name: name.map(str::to_string),
            message,
        }
    }

    pub fn unresolved(identifier: impl Into<String>, reference: impl Into<String>) -> Self {
        ImportError::UnresolvedReference {
            identifier: identifier.into(),
            reference: reference.into(),
        }
    }

    /// Machine-readable code, in the same family as `DdlError::code`.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Parse(err) => err.code,
            ImportError::Structure { .. } => "opengex-structure-error",
            ImportError::UnresolvedReference { .. } => "opengex-unresolved-reference",
        }
    }
}
