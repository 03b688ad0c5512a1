//! Common error types for the vocabulary registry

use thiserror::Error;

/// Common result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the identity model, services and storage
#[derive(Error, Debug)]
pub enum Error {
    /// Term supplied without a term type, or a duplicate identity tuple
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Input failed a semantic check (e.g. unknown term type)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input is malformed (address prefix, date, list cell, column count)
    #[error("Format error: {0}")]
    Format(String),

    /// Address, username or email already registered
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the capability for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// CSV reader or writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a store-level unique violation to a `ConstraintViolation`,
    /// passing every other database error through unchanged.
    pub fn from_unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::ConstraintViolation(message())
            }
            _ => Error::Database(err),
        }
    }
}
