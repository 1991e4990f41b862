//! Backing-store collaborators.
//!
//! The engine only needs two things from a store client: a way to open a
//! connection, and a connection it can hand to handlers and close again.
//! Everything a request actually does with the connection lives in its
//! handler.
//!
//! # Available Backends
//!
//! | Backend | DSN | Description |
//! |---------|-----|-------------|
//! | [`MemoryBackend`] | `memory://` | In-process key/value and set store |
//!
//! Connections are moved into exactly one thread and never shared.

mod memory;

use std::fmt;

pub use memory::{MemoryBackend, MemoryConnection};

/// Error reported by a backing-store client.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub message: String,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<String> for StoreError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for StoreError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// An open connection owned by a single thread.
pub trait Connection: Send + 'static {
    /// Release the connection. Called once, on the owning thread.
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Factory for connections. Holds the (opaque) connection configuration.
pub trait Backend: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a new connection. Called once per worker, on the worker thread.
    fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// Returns the name of this backend for logging purposes.
    fn name(&self) -> &'static str;
}
