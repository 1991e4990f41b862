//! thread_store - Off-thread backing-store requests for single-threaded hosts.
//!
//! A host that must never block its main thread hands database-style
//! requests to a pool of persistent worker threads. Each worker owns its own
//! backing-store connection; results travel back through a queue and are
//! correlated to the submitting callback on the host thread.
//!
//! # Features
//!
//! - **Lazy pool growth**: a new worker is spawned only when every existing
//!   worker is busy, bounded by a configured maximum
//! - **Exact correlation**: every request gets a unique [`RequestId`] and its
//!   callback runs exactly once
//! - **Fault isolation**: handler errors and panics become [`Failure`] results,
//!   never dead workers
//! - **Host doorbell**: workers ring a [`WakeNotifier`] after every result so the
//!   host can drain promptly
//! - **Synchronous escape hatch**: [`Manager::submit_and_await`] runs a handler
//!   on the host's own connection
//!
//! # Architecture
//!
//! ```text
//! host ──submit──▶ SendQueue ──take──▶ Worker (own connection)
//!   ▲                                      │
//!   └──drain_due◀── RecvQueue ◀──publish───┘ ──wake──▶ WakeNotifier
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use thread_store::{Callbacks, HandlerRegistry, Manager, NoopNotifier, Query, StoreConfig};
//! use thread_store::store::MemoryBackend;
//!
//! let registry = HandlerRegistry::new().with("members", fetch_members);
//! let mut manager = Manager::connect(
//!     MemoryBackend::new(),
//!     registry,
//!     StoreConfig::new("memory://"),
//!     Arc::new(NoopNotifier),
//! )?;
//!
//! manager.submit(
//!     Query::named("members", json!({"faction": 123})),
//!     Callbacks::none().on_success(|response| {
//!         println!("{}", response.payload());
//!         Ok(())
//!     }),
//! )?;
//!
//! // On every host tick:
//! manager.drain_due()?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty outside a checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

pub mod config;
pub mod core;
pub mod handler;
pub mod logging;
pub mod manager;
pub mod notify;
pub mod pool;
pub mod queue;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use crate::core::{Error, Result};
pub use config::{Config, StoreConfig};
pub use handler::{HandlerError, HandlerRef, HandlerRegistry, Inline, NamedHandler, Query};
pub use manager::{Callbacks, Manager};
pub use notify::{NoopNotifier, WakeNotifier};
pub use types::{Args, Failure, Outcome, QueryResult, RequestId, Response, Stage};
