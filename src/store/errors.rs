//! # Store Errors

use thiserror::Error;

use crate::geometry::GeometryError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Backend errors. Per-item commit rejections are not errors; they are
/// recorded in the [`TransactionResult`](crate::transaction::TransactionResult).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is not open")]
    NotOpen,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store data corrupted: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned
    }
}
