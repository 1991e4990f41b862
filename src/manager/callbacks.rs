//! Pending callback table.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

use crate::core::CallbackError;
use crate::types::{Failure, RequestId, Response};

/// Result returned by host callbacks.
pub type CallbackResult = Result<(), CallbackError>;

type OnSuccess = Box<dyn FnOnce(Response) -> CallbackResult>;
type OnError = Box<dyn FnOnce(&Failure) -> CallbackResult>;

/// Callbacks for one submission. Both are optional.
///
/// Callbacks run on the host thread inside `drain_due`/`await_all`, so they
/// need not be `Send`.
#[derive(Default)]
pub struct Callbacks {
    pub(crate) on_success: Option<OnSuccess>,
    pub(crate) on_error: Option<OnError>,
}

impl Callbacks {
    /// No callbacks: successes are dropped, failures are logged.
    pub fn none() -> Self {
        Self::default()
    }

    /// Called with the response. An error here propagates out of the drain.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Response) -> CallbackResult + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called with the failure. An error here marks the failure unhandled.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Failure) -> CallbackResult + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Where a request was submitted from.
pub(crate) struct Origin {
    pub location: &'static Location<'static>,
    pub trace: Option<Backtrace>,
}

impl Origin {
    pub fn rendered_trace(&self) -> Option<String> {
        self.trace.as_ref().map(|t| t.to_string())
    }
}

pub(crate) struct PendingCallback {
    pub callbacks: Callbacks,
    pub origin: Origin,
}

/// In-flight requests keyed by identifier. Owned by the host thread.
#[derive(Default)]
pub(crate) struct CallbackTable {
    entries: HashMap<RequestId, PendingCallback>,
}

impl CallbackTable {
    pub fn insert(&mut self, id: RequestId, pending: PendingCallback) {
        let previous = self.entries.insert(id, pending);
        debug_assert!(previous.is_none(), "request id {} reused", id);
    }

    pub fn remove(&mut self, id: RequestId) -> Option<PendingCallback> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
