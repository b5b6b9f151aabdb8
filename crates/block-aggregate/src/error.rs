//! Error types for block aggregation.

use raster_common::TableError;
use thiserror::Error;

/// Errors that can occur during block aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// The source table has two or more columns with the same name.
    #[error("duplicate column names in source table: {}", .0.join(", "))]
    DuplicateColumn(Vec<String>),

    /// The source row count does not match the declared grid dimensions.
    #[error("source table has {rows} rows but grid is {nrows}x{ncols}")]
    DimensionMismatch {
        nrows: usize,
        ncols: usize,
        rows: usize,
    },

    /// The reduction failed for a block.
    #[error("reduction failed for block ({block_row}, {block_col}): {message}")]
    Reduction {
        block_row: i64,
        block_col: i64,
        message: String,
    },

    /// An argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The source table has no usable coordinates.
    #[error("source table has no finite '{0}' coordinates")]
    MissingCoordinates(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Table or grid operation failed.
    #[error("table error: {0}")]
    Table(#[from] TableError),
}

impl AggregateError {
    /// Create a Reduction error for the given block.
    pub fn reduction(block_row: i64, block_col: i64, message: impl Into<String>) -> Self {
        Self::Reduction {
            block_row,
            block_col,
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_yaml::Error> for AggregateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for AggregateError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregateError>;
