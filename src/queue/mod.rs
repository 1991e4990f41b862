//! Queues between the host thread and the workers.
//!
//! ```text
//!   host ──schedule──▶ SendQueue ──take──▶ workers
//!   host ◀──drain_all── RecvQueue ◀──publish── workers
//! ```
//!
//! Both sit on unbounded crossbeam channels. The send side is multi-consumer
//! (every worker holds the same receiver); invalidation drops the only
//! sender, so workers see the remaining units first and then the shutdown.

mod recv;
mod send;

pub use recv::RecvQueue;
pub use send::SendQueue;
