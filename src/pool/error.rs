//! Worker pool error types.

use std::fmt;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone)]
pub enum PoolError {
    /// The send queue has been invalidated.
    Shutdown,

    /// The OS refused to start a worker thread.
    Spawn(String),
}

impl PoolError {
    /// Check if this is a shutdown error.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PoolError::Shutdown)
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            PoolError::Shutdown => "Pool shutdown",
            PoolError::Spawn(msg) => msg,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Shutdown => {
                write!(f, "queue has been shut down")
            }
            PoolError::Spawn(msg) => {
                write!(f, "failed to spawn worker: {}", msg)
            }
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
