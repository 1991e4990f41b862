//! Shutdown and queue invalidation.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::json;

use crate::helpers::*;
use thread_store::{Callbacks, Error, NoopNotifier, Query};

/// Test submissions after shutdown are rejected
#[test]
fn test_submit_after_shutdown() {
    let gate = Gate::default();
    let mut manager = manager(2, &gate, Arc::new(NoopNotifier));

    manager.shutdown();
    assert!(manager.is_closed());

    let err = manager
        .submit(Query::named("echo", json!(1)), Callbacks::none())
        .unwrap_err();
    assert!(err.is_queue_shutdown());
    assert_eq!(manager.pending_count(), 0);

    assert!(matches!(
        manager.submit_and_await(Query::named("echo", json!(1))),
        Err(Error::QueueShutdown)
    ));
}

/// Test shutdown is idempotent and stops every worker
#[test]
fn test_shutdown_twice() {
    let gate = Gate::default();
    let mut manager = manager(2, &gate, Arc::new(NoopNotifier));

    manager.shutdown();
    manager.shutdown();

    assert_eq!(manager.live_worker_count(), 0);
}

/// Test queued work is still served during shutdown and can be drained after
#[test]
fn test_shutdown_drains_queued_work() {
    let gate = Gate::default();
    let mut manager = manager(1, &gate, Arc::new(NoopNotifier));
    let count = Rc::new(RefCell::new(0));

    manager
        .submit(Query::named("block", json!(0)), Callbacks::none())
        .unwrap();
    wait_until("worker to block", || manager.busy_count() == 1);

    for i in 1..=3 {
        let count = Rc::clone(&count);
        manager
            .submit(
                Query::named("echo", json!(i)),
                Callbacks::none().on_success(move |_| {
                    *count.borrow_mut() += 1;
                    Ok(())
                }),
            )
            .unwrap();
    }
    assert_eq!(manager.queued_count(), 3);

    gate.open();
    manager.shutdown();

    assert_eq!(manager.queued_count(), 0);
    manager.drain_due().unwrap();
    assert_eq!(*count.borrow(), 3);
    assert_eq!(manager.pending_count(), 0);
}
