//! Error types for all compilation phases.

use std::path::PathBuf;

use thiserror::Error;

/// Lexer errors. All of them are fatal for the current compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char, usize),

    #[error("Unterminated string literal")]
    UnterminatedString(usize),

    #[error("Unterminated block comment")]
    UnterminatedComment(usize),

    #[error("Malformed number '{0}'")]
    MalformedNumber(String, usize),

    #[error("Integer constant '{0}' is out of range (0..=32767)")]
    IntegerTooLarge(String, usize),
}

impl LexerError {
    pub fn unexpected_char(c: char, line: usize) -> Self {
        Self::UnexpectedChar(c, line)
    }

    pub fn unterminated_string(line: usize) -> Self {
        Self::UnterminatedString(line)
    }

    pub fn unterminated_comment(line: usize) -> Self {
        Self::UnterminatedComment(line)
    }

    pub fn malformed_number(s: String, line: usize) -> Self {
        Self::MalformedNumber(s, line)
    }

    pub fn line(&self) -> usize {
        match self {
            Self::UnexpectedChar(_, line) => *line,
            Self::UnterminatedString(line) => *line,
            Self::UnterminatedComment(line) => *line,
            Self::MalformedNumber(_, line) => *line,
            Self::IntegerTooLarge(_, line) => *line,
        }
    }
}

/// Parser errors. Fatal: they abort the current compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParserError {
    #[error("[Parsing error] Line {line}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("[Parsing error] Line {line}: {message}")]
    General { message: String, line: usize },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        line: usize,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            line,
        }
    }

    pub fn general(message: impl Into<String>, line: usize) -> Self {
        Self::General {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::UnexpectedToken { line, .. } => *line,
            Self::General { line, .. } => *line,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            line: err.line(),
        }
    }
}

/// Symbol table errors, turned into semantic errors by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("Redeclaration of identifier '{0}'")]
    Redeclared(String),
}

/// A recoverable error found during analysis. Parsing continues after one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[Semantic error] Line {line}: {message}")]
pub struct SemanticError {
    pub message: String,
    pub line: usize,
}

impl SemanticError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// A unified error type for compiling one unit.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Parser(#[from] ParserError),

    #[error("{} semantic error(s)", .0.len())]
    Semantic(Vec<SemanticError>),

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<LexerError> for CompileError {
    fn from(err: LexerError) -> Self {
        Self::Parser(err.into())
    }
}

impl CompileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
