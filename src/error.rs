//! Error types for the stubcast crate.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for the stubcast crate.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A doctype string was rejected by the grammar.
    #[error("invalid doctype syntax at offset {position}: {offending:?}")]
    DoctypeSyntax {
        /// The offending substring.
        offending: String,
        /// Byte offset of the offending substring in the doctype.
        position: usize,
    },

    /// A qualified name in a doctype equals a reserved Python keyword.
    #[error("blacklisted qualname {0:?} is a reserved keyword")]
    BlacklistedQualname(String),

    /// The module source could not be parsed as Python at all.
    #[error("parser error: {0}")]
    Parser(String),

    /// Configuration file errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// An import declaration is malformed.
    #[error("invalid import: {0}")]
    Import(String),

    /// Other miscellaneous errors.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a new doctype syntax error.
    pub fn syntax(offending: impl Into<String>, position: usize) -> Self {
        Self::DoctypeSyntax {
            offending: offending.into(),
            position,
        }
    }

    /// Creates a new parser error.
    pub fn parser_error(msg: impl Into<String>) -> Self {
        Self::Parser(msg.into())
    }

    /// Creates a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new import error.
    pub fn import_error(msg: impl Into<String>) -> Self {
        Self::Import(msg.into())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
