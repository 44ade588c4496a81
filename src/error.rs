use thiserror::Error;

/// Errors raised by the matching and merge core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum McError {
    #[error("{what}: lengths differ ({left} vs {right})")]
    SizeMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("catalog extension '{0}' is already registered")]
    DuplicateExtension(String),

    #[error("catalog extension '{0}' is not registered")]
    UnknownExtension(String),

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{name}' has type {found}, expected {expected}")]
    ColumnType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("row {row} has a null position")]
    NullPosition { row: usize },

    #[error("row {row} has a non-finite position")]
    NonFinitePosition { row: usize },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("{0} already exists; set overwrite to replace it")]
    AlreadyExists(String),
}

pub type Result<T> = std::result::Result<T, McError>;
