//! Error types for the conformance harness
//!
//! Errors are grouped by the failure taxonomy the harness reports on:
//! connection, timeout, protocol, missing resource, adapter and assertion
//! failures. Messages are written to be read in a single FAIL line without
//! re-running the case.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::envelope::ErrorBody;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Cortex is not running (socket not found: {})", .0.display())]
    SocketNotFound(PathBuf),

    #[error("Cortex refused connection at {}", .0.display())]
    ConnectionRefused(PathBuf),

    #[error("Cannot connect to Cortex: {0}")]
    ConnectionFailed(#[source] io::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    // === Timeout Errors ===
    #[error("Timeout after {}ms waiting for {operation}", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    // === Protocol Errors ===
    #[error("Runtime returned {code}: {message}")]
    Protocol { code: String, message: String },

    #[error("Resource not found ({code}): {message}")]
    ResourceNotFound { code: String, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // === Fixture Errors ===
    #[error("Failed to bind fixture site on {addr}: {source}")]
    FixtureBind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Fixture site preflight failed: {0}")]
    FixturePreflight(String),

    // === Adapter Errors ===
    #[error("Client '{client}' is unavailable: {reason}")]
    ClientUnavailable { client: String, reason: String },

    #[error("Driver for client '{client}' failed: {detail}")]
    AdapterFailed { client: String, detail: String },

    #[error("Unknown client '{0}'. Expected one of: native, python, typescript, both, all")]
    UnknownClient(String),

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Invalid arguments for '{method}': {reason}")]
    InvalidArguments { method: String, reason: String },

    // === Assertion Errors ===
    #[error("Assertion failed on {field}: {detail}")]
    Assertion { field: String, detail: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Suite '{name}' not found in {}", .dir.display())]
    SuiteNotFound { name: String, dir: PathBuf },

    #[error("Failed to parse suite '{path}': {error}")]
    SuiteParse { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create an adapter failure for a client
    pub fn adapter_failed(client: &str, detail: impl Into<String>) -> Self {
        Self::AdapterFailed {
            client: client.to_string(),
            detail: detail.into(),
        }
    }

    /// Create an invalid arguments error for a method
    pub fn invalid_arguments(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the transport failed (socket absent, refused or closed)
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Error::SocketNotFound(_)
                | Error::ConnectionRefused(_)
                | Error::ConnectionFailed(_)
                | Error::ConnectionClosed
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Taxonomy label used as the prefix of FAIL diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            Error::SocketNotFound(_)
            | Error::ConnectionRefused(_)
            | Error::ConnectionFailed(_)
            | Error::ConnectionClosed => "ConnectionFailure",
            Error::Timeout { .. } => "Timeout",
            Error::Protocol { .. } | Error::MalformedResponse(_) => "ProtocolError",
            Error::ResourceNotFound { .. } => "ResourceNotFound",
            Error::ClientUnavailable { .. } | Error::AdapterFailed { .. } => "AdapterFailure",
            Error::Assertion { .. } => "AssertionFailure",
            Error::UnknownClient(_)
            | Error::UnknownMethod(_)
            | Error::InvalidArguments { .. }
            | Error::Config(_)
            | Error::ConfigParse(_)
            | Error::SuiteNotFound { .. }
            | Error::SuiteParse { .. } => "ConfigurationError",
            Error::FixtureBind { .. } | Error::FixturePreflight(_) => "FixtureFailure",
            Error::Io(_) | Error::FileRead { .. } | Error::Json(_) | Error::Internal(_) => {
                "InternalError"
            }
        }
    }
}

impl From<ErrorBody> for Error {
    fn from(e: ErrorBody) -> Self {
        // Map protocol error codes back to our error types where possible
        match e.code.as_str() {
            "E_MAP_NOT_FOUND" | "E_NODE_NOT_FOUND" | "E_NOT_FOUND" => Error::ResourceNotFound {
                code: e.code,
                message: e.message,
            },
            _ => Error::Protocol {
                code: e.code,
                message: e.message,
            },
        }
    }
}
