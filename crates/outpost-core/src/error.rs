//! Error types for the Outpost engine

use thiserror::Error;

/// Main error type for Outpost operations
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized write method string
    #[error("Invalid write method: {0}")]
    InvalidMethod(String),

    /// Invalid mutation id format
    #[error("Invalid mutation id: {0}")]
    InvalidMutationId(String),
}

/// Result type alias using OutboxError
pub type OutboxResult<T> = Result<T, OutboxError>;
