//! Error types for the tdsl reader and writer

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading, writing or evaluating configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Syntax problem at a known location in the source text.
    #[error("{message} at line {line} position {position}")]
    Syntax {
        message: String,
        line: usize,
        position: usize,
        line_content: String,
    },

    #[error("Parsing error - invalid file structure, state = {0}")]
    InvalidStructure(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Line number (1-based) for syntax errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Character position within the line for syntax errors.
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Full text of the offending line for syntax errors.
    pub fn line_content(&self) -> Option<&str> {
        match self {
            Error::Syntax { line_content, .. } => Some(line_content),
            _ => None,
        }
    }
}
