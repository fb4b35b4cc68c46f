//! Engine error types
//!
//! Error codes:
//! - GEOQ_PRECONDITION_VIOLATION (ERROR): engine state forbids the call
//! - GEOQ_VALIDATION_FAILED (ERROR): bad argument, rejected before dispatch
//! - GEOQ_NOT_SUPPORTED (ERROR): backend lacks the capability
//! - GEOQ_STORE_FAILED (ERROR, FATAL on corruption): backend call failed
//! - GEOQ_GEOMETRY_FAILED (ERROR): geometry collaborator failed
//!
//! Per-item commit rejections are never errors; they are reported in the
//! returned `TransactionResult`.

use std::fmt;

use crate::geometry::GeometryError;
use crate::store::StoreError;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The call failed; the engine is healthy
    Error,
    /// Stored data cannot be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    PreconditionViolation,
    ValidationFailed,
    NotSupported,
    StoreFailed,
    GeometryFailed,
}

impl EngineErrorCode {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            EngineErrorCode::PreconditionViolation => "GEOQ_PRECONDITION_VIOLATION",
            EngineErrorCode::ValidationFailed => "GEOQ_VALIDATION_FAILED",
            EngineErrorCode::NotSupported => "GEOQ_NOT_SUPPORTED",
            EngineErrorCode::StoreFailed => "GEOQ_STORE_FAILED",
            EngineErrorCode::GeometryFailed => "GEOQ_GEOMETRY_FAILED",
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with code, severity and message.
#[derive(Debug)]
pub struct EngineError {
    code: EngineErrorCode,
    severity: Severity,
    message: String,
}

impl EngineError {
    fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Engine state forbids the call (not open, transaction state, read-only).
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::PreconditionViolation, message)
    }

    pub fn not_open() -> Self {
        Self::precondition("engine is not open")
    }

    pub fn not_in_transaction() -> Self {
        Self::precondition("no transaction is active")
    }

    pub fn already_in_transaction() -> Self {
        Self::precondition("a transaction is already active")
    }

    pub fn not_editable() -> Self {
        Self::precondition("backend is not editable")
    }

    /// Argument rejected before backend dispatch.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::ValidationFailed, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::NotSupported, message)
    }

    pub fn store_failed(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::StoreFailed, message)
    }

    pub fn geometry_failed(message: impl Into<String>) -> Self {
        Self::new(EngineErrorCode::GeometryFailed, message)
    }

    pub fn code(&self) -> EngineErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code.code(), self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotSupported(what) => EngineError::not_supported(what),
            StoreError::Geometry(g) => g.into(),
            StoreError::Corrupted(_) => Self {
                code: EngineErrorCode::StoreFailed,
                severity: Severity::Fatal,
                message: e.to_string(),
            },
            other => EngineError::store_failed(other.to_string()),
        }
    }
}

impl From<GeometryError> for EngineError {
    fn from(e: GeometryError) -> Self {
        EngineError::geometry_failed(e.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
