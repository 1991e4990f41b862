//! Handler failures, callback errors and connection errors.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::json;

use crate::helpers::*;
use thread_store::handler::{HandlerError, HandlerResult};
use thread_store::store::{MemoryBackend, MemoryConnection};
use thread_store::{
    Args, Callbacks, Error, Failure, HandlerRegistry, Manager, NoopNotifier, Query, Stage,
    StoreConfig,
};

fn failing(_: &mut MemoryConnection, _: &Args) -> HandlerResult {
    Err(HandlerError::new("query failed"))
}

fn panicking(_: &mut MemoryConnection, _: &Args) -> HandlerResult {
    panic!("handler blew up")
}

fn faulty_manager() -> Manager<MemoryBackend> {
    Manager::connect(
        MemoryBackend::new(),
        HandlerRegistry::new()
            .with("echo", echo)
            .with("fail", failing)
            .with("panic", panicking),
        StoreConfig::default().with_worker_count_max(1),
        Arc::new(NoopNotifier),
    )
    .unwrap()
}

fn record_failure(slot: &Rc<RefCell<Option<Failure>>>) -> Callbacks {
    let slot = Rc::clone(slot);
    Callbacks::none().on_error(move |failure| {
        *slot.borrow_mut() = Some(failure.clone());
        Ok(())
    })
}

/// Test a handler error reaches on_error with its stage and arguments
#[test]
fn test_handler_error_goes_to_on_error() {
    let mut manager = faulty_manager();
    let failure = Rc::new(RefCell::new(None));

    manager
        .submit(Query::named("fail", json!({"key": "a"})), record_failure(&failure))
        .unwrap();
    manager.await_all().unwrap();

    let failure = failure.borrow().clone().unwrap();
    assert_eq!(failure.stage(), Stage::Execute);
    assert_eq!(failure.message(), "query failed");
    assert_eq!(failure.args(), Some(&json!({"key": "a"})));
    assert_eq!(manager.stats().failed, 1);
}

/// Test a panicking handler fails its request but not its worker
#[test]
fn test_panic_does_not_kill_worker() {
    let mut manager = faulty_manager();
    let failure = Rc::new(RefCell::new(None));
    let echoed = Rc::new(RefCell::new(false));

    manager
        .submit(Query::named("panic", json!(null)), record_failure(&failure))
        .unwrap();

    let flag = Rc::clone(&echoed);
    manager
        .submit(
            Query::named("echo", json!(1)),
            Callbacks::none().on_success(move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();
    manager.await_all().unwrap();

    let failure = failure.borrow().clone().unwrap();
    assert_eq!(failure.stage(), Stage::Execute);
    assert!(failure.message().contains("handler blew up"));
    assert!(*echoed.borrow());
    assert_eq!(manager.worker_count(), 1);
    assert!(manager.workers()[0].is_alive());
}

/// Test an unknown handler name is reported as a failure
#[test]
fn test_unknown_handler() {
    let mut manager = faulty_manager();
    let failure = Rc::new(RefCell::new(None));

    manager
        .submit(Query::named("missing", json!(null)), record_failure(&failure))
        .unwrap();
    manager.await_all().unwrap();

    assert!(failure.borrow().as_ref().unwrap().message().contains("missing"));
}

/// Test a failing success callback propagates with its submission site
#[test]
fn test_success_callback_error_propagates() {
    let mut manager = faulty_manager();
    let later = Rc::new(RefCell::new(false));

    let id = manager
        .submit(
            Query::named("echo", json!(1)),
            Callbacks::none().on_success(|_| Err("bad payload".into())),
        )
        .unwrap();
    let flag = Rc::clone(&later);
    manager
        .submit(
            Query::named("echo", json!(2)),
            Callbacks::none().on_success(move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();

    let err = manager.await_all().unwrap_err();
    match &err {
        Error::Callback { id: failed, location, source, .. } => {
            assert_eq!(*failed, id);
            assert!(location.file().ends_with("failures.rs"));
            assert_eq!(source.to_string(), "bad payload");
        }
        other => panic!("unexpected error: {}", other),
    }

    // The other request is still delivered
    manager.await_all().unwrap();
    assert!(*later.borrow());
}

/// Test a failing error callback does not propagate
#[test]
fn test_error_callback_error_is_swallowed() {
    let mut manager = faulty_manager();

    manager
        .submit(
            Query::named("fail", json!(null)),
            Callbacks::none().on_error(|_| Err("could not handle".into())),
        )
        .unwrap();
    manager
        .submit(Query::named("fail", json!(null)), Callbacks::none())
        .unwrap();

    manager.await_all().unwrap();
    assert_eq!(manager.stats().failed, 2);
}

/// Test unhandled failures are logged with stage, message, args and call site
#[test]
fn test_unhandled_failure_is_logged() {
    let mut manager = faulty_manager();
    let logs = LogCapture::default();

    manager
        .submit(Query::named("fail", json!({"key": "a"})), Callbacks::none())
        .unwrap();
    manager
        .submit(
            Query::named("fail", json!({"key": "b"})),
            Callbacks::none().on_error(|_| Err("could not handle".into())),
        )
        .unwrap();

    logs.record(|| manager.await_all()).unwrap();

    let out = logs.contents();
    assert_eq!(out.matches("unhandled request failure: query failed").count(), 2);
    assert!(out.contains("stage=execute"));
    assert!(out.contains(r#"args: {"key":"a"}"#));
    assert!(out.contains(r#"args: {"key":"b"}"#));
    assert!(out.contains("error callback failed"));
    assert!(out.contains("could not handle"));
    assert!(out.contains("submitted at"));
    assert!(out.contains("failures.rs"));
}

fn unencodable(_: &mut MemoryConnection, _: &Args) -> HandlerResult {
    Err(HandlerError::response("row cannot be encoded"))
}

/// Test a response-stage failure reaches on_error with its stage
#[test]
fn test_response_stage_failure() {
    let mut manager = Manager::connect(
        MemoryBackend::new(),
        HandlerRegistry::new().with("unencodable", unencodable),
        StoreConfig::default(),
        Arc::new(NoopNotifier),
    )
    .unwrap();
    let failure = Rc::new(RefCell::new(None));

    manager
        .submit(Query::named("unencodable", json!({"id": 9})), record_failure(&failure))
        .unwrap();
    manager.await_all().unwrap();

    let failure = failure.borrow().clone().unwrap();
    assert_eq!(failure.stage(), Stage::Response);
    assert_eq!(failure.message(), "row cannot be encoded");
    assert_eq!(failure.args(), Some(&json!({"id": 9})));
}

/// Test connect surfaces a refused connection
#[test]
fn test_connect_error() {
    let result = Manager::connect(
        MemoryBackend::from_dsn("memory://fail").unwrap(),
        HandlerRegistry::<MemoryConnection>::new(),
        StoreConfig::default(),
        Arc::new(NoopNotifier),
    );

    assert!(matches!(result, Err(Error::Connect { .. })));
}
