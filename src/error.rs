//! Error types for the RIP server
//!
//! Every fallible operation in the crate returns [`Result`]. Errors carry a
//! machine-readable [`ErrorCode`] so the JSON-RPC layer can turn them into
//! structured error objects without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for RIP operations
pub type Result<T> = std::result::Result<T, RipError>;

/// Error types for RIP server operations
#[derive(Error, Debug)]
pub enum RipError {
    /// Malformed or incomplete configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// A variable name is not declared in the relevant registry list
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A sampling policy name is not declared in the catalog
    #[error("Unknown sampling policy: {0}")]
    UnknownPolicy(String),

    /// The device driver failed while collecting a sample
    #[error("Sampling failure: {0}")]
    SamplingFailure(String),

    /// The metadata document could not be assembled
    #[error("Metadata build failure: {0}")]
    BuildFailure(String),

    /// Request parameters are malformed or out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The device driver rejected a read or write
    #[error("Driver error: {0}")]
    Driver(String),

    /// The server is not running
    #[error("Server stopped: {0}")]
    ServerStopped(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // JSON-RPC 2.0 reserved codes
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    // Application codes
    UnknownVariable,
    DriverFailure,
    ServerStopped,
    BuildFailure,
    ConfigurationInvalid,
}

impl ErrorCode {
    /// JSON-RPC error code
    pub fn as_number(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,

            ErrorCode::UnknownVariable => -32001,
            ErrorCode::DriverFailure => -32002,
            ErrorCode::ServerStopped => -32003,
            ErrorCode::BuildFailure => -32004,
            ErrorCode::ConfigurationInvalid => -32005,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::ParseError
            | ErrorCode::InvalidRequest
            | ErrorCode::MethodNotFound
            | ErrorCode::InvalidParams => "protocol",
            ErrorCode::UnknownVariable => "registry",
            ErrorCode::DriverFailure => "device",
            ErrorCode::ServerStopped => "lifecycle",
            ErrorCode::BuildFailure => "metadata",
            ErrorCode::ConfigurationInvalid => "configuration",
            ErrorCode::InternalError => "internal",
        }
    }
}

impl RipError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unknown variable error
    pub fn unknown_variable<S: Into<String>>(name: S) -> Self {
        Self::UnknownVariable(name.into())
    }

    /// Create an unknown policy error
    pub fn unknown_policy<S: Into<String>>(name: S) -> Self {
        Self::UnknownPolicy(name.into())
    }

    /// Create a sampling failure
    pub fn sampling<S: Into<String>>(msg: S) -> Self {
        Self::SamplingFailure(msg.into())
    }

    /// Create a metadata build failure
    pub fn build_failure<S: Into<String>>(msg: S) -> Self {
        Self::BuildFailure(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        Self::Driver(msg.into())
    }

    /// Create a server stopped error
    pub fn server_stopped<S: Into<String>>(msg: S) -> Self {
        Self::ServerStopped(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Map the error to its structured code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            RipError::Config(_) => ErrorCode::ConfigurationInvalid,
            RipError::UnknownVariable(_) => ErrorCode::UnknownVariable,
            RipError::UnknownPolicy(_) | RipError::InvalidInput(_) => ErrorCode::InvalidParams,
            RipError::SamplingFailure(_) | RipError::Driver(_) | RipError::Timeout(_) => {
                ErrorCode::DriverFailure
            }
            RipError::BuildFailure(_) => ErrorCode::BuildFailure,
            RipError::ServerStopped(_) => ErrorCode::ServerStopped,
            RipError::Io(_) => ErrorCode::InternalError,
        }
    }
}
