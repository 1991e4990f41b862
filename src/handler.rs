//! Request handlers: what a worker runs against its connection.
//!
//! A request names its handler in one of two ways:
//!
//! | Variant | Resolution | Carries state |
//! |---------|------------|---------------|
//! | [`HandlerRef::Named`] | looked up in the [`HandlerRegistry`], cached per worker | no |
//! | [`HandlerRef::Inline`] | `fn` pointer travelling with the request | serialized capture only |
//!
//! Inline handlers are plain function pointers plus a JSON capture, so no
//! shared mutable state can ride along into a worker thread.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::StoreError;
use crate::types::{Args, Failure, Outcome, RequestId, Response, Stage};

// =============================================================================
// Handler Error
// =============================================================================

/// Error raised by a handler while serving a request.
#[derive(Debug, Clone)]
pub struct HandlerError {
    stage: Stage,
    message: String,
}

impl HandlerError {
    /// Execution error (the handler could not do its work).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Execute,
            message: message.into(),
        }
    }

    /// The work was done but its output could not become a [`Response`].
    pub fn response(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Response,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        Self::new(e.message)
    }
}

/// Result type returned by handlers.
pub type HandlerResult = Result<Response, HandlerError>;

/// Serialize handler output into a [`Response`].
pub fn respond<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value)
        .map(Response::new)
        .map_err(|e| HandlerError::response(format!("cannot encode response: {}", e)))
}

/// Decode request arguments into a typed value.
pub fn parse_args<T: DeserializeOwned>(args: &Args) -> Result<T, HandlerError> {
    T::deserialize(args).map_err(|e| HandlerError::new(format!("invalid arguments: {}", e)))
}

// =============================================================================
// Named Handlers
// =============================================================================

/// A stateless, reusable handler selected by name.
///
/// The same instance may run on any worker, any number of times.
pub trait NamedHandler<C>: Send + Sync + 'static {
    fn run(&self, conn: &mut C, args: &Args) -> HandlerResult;
}

impl<C, F> NamedHandler<C> for F
where
    F: Fn(&mut C, &Args) -> HandlerResult + Send + Sync + 'static,
{
    #[inline]
    fn run(&self, conn: &mut C, args: &Args) -> HandlerResult {
        self(conn, args)
    }
}

/// Name → handler table shared read-only by every worker and the manager.
pub struct HandlerRegistry<C> {
    handlers: HashMap<String, Arc<dyn NamedHandler<C>>>,
}

impl<C> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: impl NamedHandler<C>) -> &mut Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, handler: impl NamedHandler<C>) -> Self {
        self.register(name, handler);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn NamedHandler<C>>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for HandlerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

// =============================================================================
// Inline Handlers
// =============================================================================

/// Signature of an inline handler: connection, serialized capture, arguments.
pub type InlineFn<C> = fn(&mut C, &Value, &Args) -> HandlerResult;

/// A caller-supplied handler transported by value.
pub struct Inline<C> {
    func: InlineFn<C>,
    capture: Value,
}

impl<C> Inline<C> {
    /// Inline handler without captured data.
    pub fn new(func: InlineFn<C>) -> Self {
        Self {
            func,
            capture: Value::Null,
        }
    }

    /// Inline handler carrying `capture`, serialized now.
    pub fn with_capture<T: Serialize>(func: InlineFn<C>, capture: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            func,
            capture: serde_json::to_value(capture)?,
        })
    }

    pub fn capture(&self) -> &Value {
        &self.capture
    }

    #[inline]
    pub fn call(&self, conn: &mut C, args: &Args) -> HandlerResult {
        (self.func)(conn, &self.capture, args)
    }
}

impl<C> Clone for Inline<C> {
    fn clone(&self) -> Self {
        Self {
            func: self.func,
            capture: self.capture.clone(),
        }
    }
}

impl<C> fmt::Debug for Inline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inline")
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Handler Reference / Query
// =============================================================================

/// What to run for a request.
pub enum HandlerRef<C> {
    Named(String),
    Inline(Inline<C>),
}

impl<C> HandlerRef<C> {
    pub fn named(name: impl Into<String>) -> Self {
        HandlerRef::Named(name.into())
    }

    /// Short label for logging.
    pub fn label(&self) -> &str {
        match self {
            HandlerRef::Named(name) => name,
            HandlerRef::Inline(_) => "<inline>",
        }
    }
}

impl<C> fmt::Debug for HandlerRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            HandlerRef::Inline(inline) => f.debug_tuple("Inline").field(inline).finish(),
        }
    }
}

/// A request before the manager assigns it an identifier.
#[derive(Debug)]
pub struct Query<C> {
    pub handler: HandlerRef<C>,
    pub args: Args,
}

impl<C> Query<C> {
    pub fn named(name: impl Into<String>, args: Args) -> Self {
        Self {
            handler: HandlerRef::named(name),
            args,
        }
    }

    pub fn inline(inline: Inline<C>, args: Args) -> Self {
        Self {
            handler: HandlerRef::Inline(inline),
            args,
        }
    }

    pub(crate) fn into_unit(self, id: RequestId) -> WorkUnit<C> {
        WorkUnit {
            id,
            handler: self.handler,
            args: self.args,
        }
    }
}

/// One unit of requested work, tagged with its identifier.
#[derive(Debug)]
pub struct WorkUnit<C> {
    pub id: RequestId,
    pub handler: HandlerRef<C>,
    pub args: Args,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Runs handlers against one connection, caching named resolutions.
///
/// Every fault (error or panic) is converted into a [`Failure`].
pub(crate) struct Dispatcher<C> {
    registry: Arc<HandlerRegistry<C>>,
    resolved: HashMap<String, Arc<dyn NamedHandler<C>>>,
}

impl<C: 'static> Dispatcher<C> {
    pub(crate) fn new(registry: Arc<HandlerRegistry<C>>) -> Self {
        Self {
            registry,
            resolved: HashMap::new(),
        }
    }

    fn resolve(&mut self, name: &str) -> Option<Arc<dyn NamedHandler<C>>> {
        if let Some(handler) = self.resolved.get(name) {
            return Some(Arc::clone(handler));
        }
        let handler = self.registry.resolve(name)?;
        self.resolved.insert(name.to_string(), Arc::clone(&handler));
        Some(handler)
    }

    pub(crate) fn run(&mut self, conn: &mut C, handler: &HandlerRef<C>, args: &Args) -> Outcome {
        let result = match handler {
            HandlerRef::Named(name) => {
                let Some(named) = self.resolve(name) else {
                    return Err(Failure::execute(format!("no handler registered as '{}'", name))
                        .with_args(args.clone()));
                };
                panic::catch_unwind(AssertUnwindSafe(|| named.run(conn, args)))
            }
            HandlerRef::Inline(inline) => {
                panic::catch_unwind(AssertUnwindSafe(|| inline.call(conn, args)))
            }
        };

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(Failure::new(e.stage, e.message).with_args(args.clone())),
            Err(payload) => Err(Failure::execute(format!(
                "handler panicked: {}",
                panic_message(payload.as_ref())
            ))
            .with_args(args.clone())),
        }
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.resolved.len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}
