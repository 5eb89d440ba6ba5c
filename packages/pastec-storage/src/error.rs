//! Error types for pastec-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database errors (SQLite)
    Database,
    /// Malformed source artifact rows
    Parse,
    /// Table already exists and overwrite was not requested
    TableExists,
    /// Table not found
    TableNotFound,
    /// Table name outside `[A-Za-z0-9_]`
    InvalidTableName,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Parse => "parse",
            ErrorKind::TableExists => "table_exists",
            ErrorKind::TableNotFound => "table_not_found",
            ErrorKind::InvalidTableName => "invalid_table_name",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn table_exists(table: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TableExists,
            format!("Table already exists: {}", table.into()),
        )
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TableNotFound,
            format!("Table not found: {}", table.into()),
        )
    }

    pub fn invalid_table_name(table: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidTableName,
            format!(
                "Invalid table name '{}': only alphanumeric or underscore characters are allowed",
                table.into()
            ),
        )
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::new(ErrorKind::IO, format!("I/O error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
