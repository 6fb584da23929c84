use std::string::FromUtf8Error;
use thiserror::Error;

/// All errors coming from the database layer during operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any SQL Server driver error.
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// Any Oracle driver error.
    #[error("Oracle error: {0}")]
    Oracle(#[from] ::oracle::Error),

    /// UTF-8 decoding failed on some byte data.
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// A batch handed to the target still contained a standalone GO line.
    /// This is a programming error in the caller, reported distinctly.
    #[error("Batch still contains a standalone GO separator: {0}")]
    EmbeddedGo(String),

    /// Writing rows to the target failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    /// The requested object was not found on the source.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// The raw server message, preserved verbatim for the root-cause
    /// analyzer. Wrapper context is kept out of this string.
    pub fn server_text(&self) -> String {
        match self {
            DbError::Mssql(err) => err.to_string(),
            DbError::Oracle(err) => err.to_string(),
            DbError::Write(inner) => inner.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The SQL Server driver failed to open the connection.
    #[error("SQL Server connector creation failed: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// The Oracle driver failed to open the connection.
    #[error("Oracle connector creation failed: {0}")]
    Oracle(#[from] ::oracle::Error),

    /// An invalid connection configuration was provided.
    #[error("Invalid connection config: {0}")]
    InvalidConfig(String),

    /// Network-level connection error.
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),
}
