//! Integration tests for thread_store
//!
//! These tests drive a real [`Manager`](thread_store::Manager) with worker
//! threads against the in-memory backend. No external services are needed.
//!
//! Run with: cargo test --test integration

mod helpers;

mod dispatch;
mod failures;
mod scaling;
mod shutdown;
