//! Error handling and error types for the ring collective engine.
//!
//! Errors fall into three classes: precondition failures detected before any
//! network activity, transport failures (a send or receive wait that expired),
//! and local copy failures (a payload that does not fit its destination).
//! None of them are retried internally; the caller decides whether to re-run
//! the whole collective call.

use std::io;
use thiserror::Error;

/// Main error type for the collective communication engine.
#[derive(Error, Debug)]
pub enum CollectiveError {
    /// Precondition failure: bad group size, empty sub-group, bad root, etc.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The engine has not been bound to a cluster node yet
    #[error("Collective engine is not initialized")]
    NotInitialized,

    /// A send or receive wait did not complete within the timeout
    #[error("{operation} request {request} did not complete within {timeout_ms} ms")]
    Timeout {
        operation: String,
        request: u64,
        timeout_ms: u64,
    },

    /// Received payload does not match the destination buffer
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Transport-level failure other than a timeout
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Lock poisoning or other synchronization failures
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid configuration parameter
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

/// Type alias for Results using CollectiveError
pub type Result<T> = std::result::Result<T, CollectiveError>;

impl CollectiveError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        CollectiveError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a timeout error for a request that was waited on
    pub fn timeout<S: Into<String>>(operation: S, request: u64, timeout_ms: u64) -> Self {
        CollectiveError::Timeout {
            operation: operation.into(),
            request,
            timeout_ms,
        }
    }

    /// Create a buffer size mismatch error
    pub fn buffer_size_mismatch(expected: usize, actual: usize) -> Self {
        CollectiveError::BufferSizeMismatch { expected, actual }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        CollectiveError::Transport {
            message: message.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        CollectiveError::Threading {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        CollectiveError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        CollectiveError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether re-running the whole collective call may succeed.
    ///
    /// Transport failures are transient; precondition and configuration
    /// failures will fail the same way again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CollectiveError::InvalidArgument { .. } => false,
            CollectiveError::NotInitialized => false,
            CollectiveError::Timeout { .. } => true,
            CollectiveError::BufferSizeMismatch { .. } => false,
            CollectiveError::Transport { .. } => true,
            CollectiveError::Threading { .. } => false,
            CollectiveError::Config { .. } => false,
            CollectiveError::InvalidParameter { .. } => false,
            CollectiveError::IO { .. } => false,
            CollectiveError::Json { .. } => false,
            CollectiveError::Toml { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            CollectiveError::InvalidArgument { .. } => "invalid_argument",
            CollectiveError::NotInitialized => "not_initialized",
            CollectiveError::Timeout { .. } => "timeout",
            CollectiveError::BufferSizeMismatch { .. } => "buffer_size_mismatch",
            CollectiveError::Transport { .. } => "transport",
            CollectiveError::Threading { .. } => "threading",
            CollectiveError::Config { .. } => "config",
            CollectiveError::InvalidParameter { .. } => "invalid_parameter",
            CollectiveError::IO { .. } => "io",
            CollectiveError::Json { .. } => "json",
            CollectiveError::Toml { .. } => "toml",
        }
    }
}

/// Return early with an error if the condition does not hold.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
