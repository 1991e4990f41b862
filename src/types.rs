//! Core types for requests and results crossing the worker boundary.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments handed to a handler. Plain data, moved by value into the worker.
pub type Args = Value;

// =============================================================================
// Request ID
// =============================================================================

/// Correlation identifier assigned by the manager at submission time.
///
/// Identifiers ascend monotonically per manager and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Response
// =============================================================================

/// Opaque payload produced by a successful handler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Response {
    payload: Value,
}

impl Response {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Response carrying no data.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_null()
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

impl From<Value> for Response {
    fn from(payload: Value) -> Self {
        Self { payload }
    }
}

// =============================================================================
// Failure
// =============================================================================

/// Where in the request lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Opening the backing-store connection.
    Connect,
    /// Running the handler.
    Execute,
    /// Turning the handler output into a [`Response`].
    Response,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::Execute => "execute",
            Stage::Response => "response",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request: stage, message and the original arguments for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    stage: Stage,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Args>,
}

impl Failure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            args: None,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(Stage::Connect, message)
    }

    pub fn execute(message: impl Into<String>) -> Self {
        Self::new(Stage::Execute, message)
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::new(Stage::Response, message)
    }

    /// Attach the arguments of the failed request.
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = Some(args);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn args(&self) -> Option<&Args> {
        self.args.as_ref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for Failure {}

// =============================================================================
// Result
// =============================================================================

/// Outcome of one request.
pub type Outcome = Result<Response, Failure>;

/// One entry published by a worker: the request it answers and its outcome.
#[derive(Debug)]
pub struct QueryResult {
    pub id: RequestId,
    pub outcome: Outcome,
}

impl QueryResult {
    pub fn new(id: RequestId, outcome: Outcome) -> Self {
        Self { id, outcome }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}
