//! Geometry collaborator errors.

use thiserror::Error;

/// Result type for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors raised while decoding or evaluating geometry blobs.
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    /// Blob was absent or zero-length.
    #[error("Empty geometry")]
    Empty,

    /// Blob could not be decoded.
    #[error("Malformed geometry: {0}")]
    Malformed(String),

    /// Geometry decoded but has no extent (e.g. an empty collection).
    #[error("Geometry has no bounding box")]
    NoExtent,

    /// Operation not available for this geometry kind.
    #[error("Unsupported geometry operation: {0}")]
    Unsupported(String),

    /// Unknown predicate name.
    #[error("Unknown spatial predicate: {0}")]
    UnknownPredicate(String),

    /// Coordinate conversion failed.
    #[error("Projection failed: {0}")]
    Projection(String),
}
