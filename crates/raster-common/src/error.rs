//! Error types for table and grid operations.

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type alias using TableError.
pub type TableResult<T> = Result<T, TableError>;

/// Errors raised by [`crate::Table`] and [`crate::RasterGrid`] conversions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' is not of type {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Arrow error: {0}")]
    Arrow(String),
}

impl TableError {
    /// Create a ColumnNotFound error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound(name.into())
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(column: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected,
        }
    }

    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }
}

impl From<ArrowError> for TableError {
    fn from(err: ArrowError) -> Self {
        Self::Arrow(err.to_string())
    }
}
