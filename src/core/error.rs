//! Core error types.

use std::fmt;
use std::panic::Location;

use crate::pool::PoolError;
use crate::types::{Failure, RequestId};

/// Error raised by a host-supplied callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to the host by the manager.
#[derive(Debug)]
pub enum Error {
    /// A backing-store connection could not be established.
    Connect { message: String },

    /// Work was submitted after shutdown began.
    QueueShutdown,

    /// A result arrived for a request with no pending callback.
    MissingCallback { id: RequestId },

    /// A success callback failed. Carries the submission site.
    Callback {
        id: RequestId,
        location: &'static Location<'static>,
        trace: Option<String>,
        source: CallbackError,
    },

    /// A synchronous request failed.
    Failure(Failure),

    /// Requests are pending but every worker has terminated.
    NoLiveWorkers { pending: usize },

    /// A worker thread could not be started.
    Spawn(String),
}

impl Error {
    /// Check if this is a queue shutdown error.
    pub fn is_queue_shutdown(&self) -> bool {
        matches!(self, Error::QueueShutdown)
    }

    /// The request this error belongs to, when there is one.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Error::MissingCallback { id } | Error::Callback { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connect { message } => write!(f, "connection failed: {}", message),
            Error::QueueShutdown => write!(f, "cannot schedule work on a shut down queue"),
            Error::MissingCallback { id } => write!(f, "missing handler for request {}", id),
            Error::Callback {
                id,
                location,
                source,
                ..
            } => write!(
                f,
                "callback for request {} (submitted at {}) failed: {}",
                id, location, source
            ),
            Error::Failure(failure) => write!(f, "{}", failure),
            Error::NoLiveWorkers { pending } => {
                write!(f, "{} pending requests but no live worker", pending)
            }
            Error::Spawn(msg) => write!(f, "failed to spawn worker: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Callback { source, .. } => Some(source.as_ref()),
            Error::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Shutdown => Error::QueueShutdown,
            PoolError::Spawn(msg) => Error::Spawn(msg),
        }
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        Error::Failure(failure)
    }
}

/// Result type alias for manager operations.
pub type Result<T> = std::result::Result<T, Error>;
