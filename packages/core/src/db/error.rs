//! Database Error Types
//!
//! Failures of the libsql adapter: opening the file, the startup schema
//! step, statement execution, transaction control and row decoding. Tree
//! rule violations never show up here; they belong to the service layer.

use std::path::PathBuf;
use thiserror::Error;

/// libsql adapter errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Database file could not be opened or created
    #[error("Cannot open tree database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Parent directory of the database file could not be created
    #[error("Cannot create database directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// One step of the startup schema setup failed
    #[error("Schema step '{step}' failed: {reason}")]
    SchemaFailed { step: String, reason: String },

    #[error(transparent)]
    Libsql(#[from] libsql::Error),

    /// Statement failed, with what was being attempted
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// BEGIN / COMMIT failed
    #[error("Transaction {stage} failed: {reason}")]
    TransactionFailed { stage: &'static str, reason: String },

    /// Stored row could not be decoded into a node
    #[error("Row for node '{id}' is invalid: {reason}")]
    InvalidRow { id: String, reason: String },
}

impl DatabaseError {
    pub fn open_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::OpenFailed { path, source }
    }

    /// Map a directory creation failure, singling out permission problems
    pub fn directory(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::DirectoryCreationFailed { path, source }
        }
    }

    pub fn schema(step: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SchemaFailed {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    pub fn transaction(stage: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::TransactionFailed {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_row(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRow {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
