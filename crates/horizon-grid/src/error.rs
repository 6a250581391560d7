//! Error types for the grid engine.

use std::path::PathBuf;

use horizon_grid_core::AsyncRuntimeError;

/// Errors produced while building a fetch query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The sort column does not exist.
    #[error("sort column {column} is out of range (grid has {column_count} columns)")]
    ColumnOutOfRange { column: usize, column_count: usize },
    /// The sort column has no query field.
    #[error("column {0} is presentation-only and cannot be sorted")]
    NotSortable(usize),
}

/// Errors reported by a [`DataService`](crate::DataService).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// The page query failed.
    #[error("query failed: {0}")]
    Query(String),
    /// The edit transaction failed and was rolled back.
    #[error("transaction failed: {0}")]
    Transaction(String),
    /// A returned value did not match the declared result type.
    #[error("field '{field}' could not be decoded: {message}")]
    Decode { field: String, message: String },
    /// The update matched no row.
    #[error("row {0} does not exist")]
    RowNotFound(String),
    /// The service could not be reached.
    #[error("data service unavailable: {0}")]
    Unavailable(String),
}

/// Errors loading or validating a [`GridConfig`](crate::GridConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TOML text could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A field holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

/// Top-level error type for grid operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Query construction failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The data service reported an error.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The async runtime was unavailable.
    #[error(transparent)]
    Runtime(#[from] AsyncRuntimeError),
    /// A column's declared index does not match its position.
    #[error("column at position {position} declares index {index}")]
    ColumnIndexMismatch { index: usize, position: usize },
    /// A column index is outside the column model.
    #[error("column {0} is out of range")]
    ColumnOutOfRange(usize),
    /// A column without a query field was asked to persist a value.
    #[error("column {0} has no query field and cannot be edited")]
    NotEditable(usize),
    /// The row is not part of the current result relation.
    #[error("row {0} is not loaded")]
    RowNotLoaded(usize),
    /// A commit or cancel arrived while no cell was being edited.
    #[error("no cell is being edited")]
    NotEditing,
    /// The grid has been unmounted.
    #[error("grid has been closed")]
    Closed,
}

/// A specialized Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
