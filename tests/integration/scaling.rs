//! Pool growth under load.

use std::sync::Arc;

use serde_json::json;

use crate::helpers::*;
use thread_store::{Callbacks, NoopNotifier, Query};

/// Test one worker exists right after connect
#[test]
fn test_connect_starts_one_worker() {
    let gate = Gate::default();
    let manager = manager(4, &gate, Arc::new(NoopNotifier));

    assert_eq!(manager.worker_count(), 1);
    assert!(manager.connection_established());
    assert!(manager.connection_error().is_none());
}

/// Test the pool grows one worker per saturated submission, up to the maximum
#[test]
fn test_pool_grows_to_max_and_stops() {
    let gate = Gate::default();
    let mut manager = manager(3, &gate, Arc::new(NoopNotifier));

    for expected_busy in 1..=3 {
        manager
            .submit(Query::named("block", json!(expected_busy)), Callbacks::none())
            .unwrap();
        wait_until("worker to pick up blocking request", || {
            manager.busy_count() == expected_busy
        });
    }
    assert_eq!(manager.worker_count(), 3);

    // Every worker busy and the pool is full: the request just queues
    manager
        .submit(Query::named("block", json!(4)), Callbacks::none())
        .unwrap();
    assert_eq!(manager.worker_count(), 3);
    assert_eq!(manager.queued_count(), 1);
    assert!(manager.load() > 0.0);

    gate.open();
    manager.await_all().unwrap();
    assert_eq!(manager.worker_count(), 3);
    assert_eq!(manager.stats().completed, 4);
}

/// Test a back-to-back burst of long-running requests grows the pool to max
#[test]
fn test_burst_grows_pool_without_waiting() {
    let gate = Gate::default();
    let mut manager = manager(3, &gate, Arc::new(NoopNotifier));

    for i in 0..4 {
        manager
            .submit(Query::named("block", json!(i)), Callbacks::none())
            .unwrap();
    }
    assert_eq!(manager.worker_count(), 3);

    wait_until("every worker to block", || manager.busy_count() == 3);
    assert_eq!(manager.queued_count(), 1);

    gate.open();
    manager.await_all().unwrap();
    assert_eq!(manager.worker_count(), 3);
    assert_eq!(manager.stats().completed, 4);
}

/// Test an idle worker absorbs new work without growing the pool
#[test]
fn test_idle_worker_prevents_growth() {
    let gate = Gate::default();
    let mut manager = manager(4, &gate, Arc::new(NoopNotifier));

    for i in 0..10 {
        manager
            .submit(Query::named("echo", json!(i)), Callbacks::none())
            .unwrap();
        manager.await_all().unwrap();
        // The result is published just before the worker goes idle
        wait_until("worker to go idle", || manager.workers()[0].is_available());
    }

    assert_eq!(manager.worker_count(), 1);
    assert_eq!(manager.workers()[0].processed(), 10);
}
