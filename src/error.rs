//! Error types for conveyq operations.

use thiserror::Error;

/// Result type used throughout conveyq.
pub type ConveyResult<T> = Result<T, ConveyError>;

/// Main error type for conveyq operations.
#[derive(Error, Debug)]
pub enum ConveyError {
    /// A handler reported failure for a task attempt
    #[error("Handler failed: {message}")]
    HandlerFailed {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A handler panicked while processing a task
    #[error("Handler panicked: {message}")]
    HandlerPanicked {
        /// Panic description recovered from the join error
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// The consumer has been shut down and no longer accepts tasks
    #[error("Conveyor is not running")]
    NotRunning,

    /// The consumer did not stop within the shutdown timeout
    #[error("Shutdown timed out after {timeout_secs} seconds")]
    ShutdownTimeout {
        /// Timeout duration in seconds
        timeout_secs: u64,
    },
}

impl ConveyError {
    /// Create a handler failure without an underlying error.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler failure wrapping an underlying error.
    pub fn handler_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::HandlerFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
