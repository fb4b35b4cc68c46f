//! CLI-specific error types
//!
//! CLI errors end the process with a non-zero exit. Engine errors raised
//! while serving a request are reported as error responses instead and do
//! not reach this type.

use std::fmt;
use std::io;

use crate::engine::{EngineError, EngineErrorCode};
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Config file missing, unreadable or invalid
    ConfigError,
    /// Reading the request or writing the response failed
    IoError,
    /// `init` found an existing store file
    AlreadyInitialized,
    /// `query` or `edit` found no store file
    NotInitialized,
    /// The store file could not be created, opened or closed
    StoreFailed,
}

impl CliErrorCode {
    /// Stable string form, printed to stderr
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GEOQ_CLI_CONFIG_ERROR",
            Self::IoError => "GEOQ_CLI_IO_ERROR",
            Self::AlreadyInitialized => "GEOQ_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "GEOQ_CLI_NOT_INITIALIZED",
            Self::StoreFailed => "GEOQ_CLI_STORE_FAILED",
        }
    }
}

/// A failure that ends the CLI process.
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create an error with an explicit code
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config file could not be loaded or failed validation
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// stdin/stdout failure or malformed request JSON
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// `init` refuses to overwrite an existing store file
    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Store file already exists",
        )
    }

    /// The configured store file has not been created yet
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Store file not found. Run 'geoquery init' first.",
        )
    }

    /// The store file could not be created, opened or closed
    pub fn store_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::StoreFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::store_failed(e.to_string())
    }
}

/// Engine failures outside a request (opening or closing the store). The
/// engine's own code is kept in the message.
impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e.code() {
            EngineErrorCode::ValidationFailed => Self::config_error(e.to_string()),
            _ => Self::store_failed(e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
