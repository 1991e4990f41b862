//! Submission, correlation and draining.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_test::{assert_pending, assert_ready, task};

use crate::helpers::*;
use thread_store::handler::{parse_args, respond, HandlerResult};
use thread_store::store::MemoryConnection;
use thread_store::{Callbacks, Inline, NoopNotifier, Query, RequestId};

/// Test a named request round-trips through a worker
#[test]
fn test_echo_round_trip() {
    let gate = Gate::default();
    let mut manager = manager(2, &gate, Arc::new(NoopNotifier));
    let received = Rc::new(RefCell::new(None));

    let slot = Rc::clone(&received);
    manager
        .submit(
            Query::named("echo", json!({"op": "echo", "payload": "x"})),
            Callbacks::none().on_success(move |response| {
                *slot.borrow_mut() = Some(response.into_payload());
                Ok(())
            }),
        )
        .unwrap();

    manager.await_all().unwrap();
    assert_eq!(
        received.borrow().clone(),
        Some(json!({"op": "echo", "payload": "x"}))
    );
    assert_eq!(manager.pending_count(), 0);
}

/// Test every result reaches the callback of its own request
#[test]
fn test_results_correlate_to_requests() {
    let gate = Gate::default();
    let mut manager = manager(4, &gate, Arc::new(NoopNotifier));
    let seen: Rc<RefCell<HashMap<RequestId, Value>>> = Rc::default();
    let mut expected = HashMap::new();

    for i in 0..50 {
        let seen = Rc::clone(&seen);
        let slot = Rc::new(RefCell::new(None::<RequestId>));
        let id_slot = Rc::clone(&slot);

        let id = manager
            .submit(
                Query::named("echo", json!({ "n": i })),
                Callbacks::none().on_success(move |response| {
                    let id = id_slot.borrow().expect("id assigned before dispatch");
                    let previous = seen.borrow_mut().insert(id, response.into_payload());
                    assert!(previous.is_none(), "callback ran twice");
                    Ok(())
                }),
            )
            .unwrap();
        *slot.borrow_mut() = Some(id);
        expected.insert(id, json!({ "n": i }));
    }

    manager.await_all().unwrap();
    assert_eq!(*seen.borrow(), expected);
    assert_eq!(manager.stats().completed, 50);
}

/// Test drain_due never blocks and eventually dispatches everything
#[test]
fn test_drain_due_is_non_blocking() {
    let gate = Gate::default();
    let notifier = Arc::new(CountingNotifier::default());
    let mut manager = manager(1, &gate, notifier.clone());
    let count = Rc::new(RefCell::new(0));

    // Nothing pending yet
    assert_eq!(manager.drain_due().unwrap(), 0);

    for i in 0..3 {
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

    // One ring per published result
    wait_until("three rings", || notifier.rings() >= 3);

    let mut drained = 0;
    while drained < 3 {
        drained += manager.drain_due().unwrap();
    }
    assert_eq!(*count.borrow(), 3);
    assert_eq!(manager.drain_due().unwrap(), 0);
}

fn scaled(conn: &mut MemoryConnection, capture: &Value, args: &thread_store::Args) -> HandlerResult {
    let factor: i64 = parse_args(capture)?;
    let n: i64 = parse_args(args)?;
    let total = conn.incr_by("total", n * factor)?;
    respond(&total)
}

/// Test inline handlers run with their capture on a worker
#[test]
fn test_inline_handler_with_capture() {
    let gate = Gate::default();
    let mut manager = manager(1, &gate, Arc::new(NoopNotifier));
    let total = Rc::new(RefCell::new(0));

    let inline = Inline::with_capture(scaled, &10).unwrap();
    let slot = Rc::clone(&total);
    manager
        .submit(
            Query::inline(inline, json!(4)),
            Callbacks::none().on_success(move |response| {
                *slot.borrow_mut() = response.decode::<i64>().unwrap();
                Ok(())
            }),
        )
        .unwrap();

    manager.await_all().unwrap();
    assert_eq!(*total.borrow(), 40);
}

/// Test the synchronous path runs on the host connection
#[test]
fn test_submit_and_await() {
    let gate = Gate::default();
    let mut manager = manager(1, &gate, Arc::new(NoopNotifier));

    let response = manager
        .submit_and_await(Query::named("echo", json!("direct")))
        .unwrap();
    assert_eq!(response.payload(), &json!("direct"));

    // No worker involvement
    assert_eq!(manager.stats().submitted, 0);
}

/// Test the request future resolves once the result is drained
#[test]
fn test_request_future() {
    let gate = Gate::default();
    let mut manager = manager(1, &gate, Arc::new(NoopNotifier));

    let mut fut = task::spawn(manager.request(Query::named("echo", json!(7))).unwrap());
    assert_pending!(fut.poll());

    manager.await_all().unwrap();
    assert!(fut.is_woken());

    let outcome = assert_ready!(fut.poll());
    assert_eq!(outcome.unwrap().payload(), &json!(7));
}
