//! Test helpers and utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thread_store::handler::{HandlerResult, NamedHandler};
use thread_store::store::{MemoryBackend, MemoryConnection};
use thread_store::{Args, HandlerRegistry, Manager, Response, StoreConfig, WakeNotifier};

/// Default deadline for polling helpers
pub const WAIT: Duration = Duration::from_secs(5);

/// Notifier that counts rings.
#[derive(Default)]
pub struct CountingNotifier {
    rings: AtomicUsize,
}

#[allow(dead_code)]
impl CountingNotifier {
    pub fn rings(&self) -> usize {
        self.rings.load(Ordering::SeqCst)
    }
}

impl WakeNotifier for CountingNotifier {
    fn wake(&self) {
        self.rings.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handler returning its arguments unchanged.
pub fn echo(_: &mut MemoryConnection, args: &Args) -> HandlerResult {
    Ok(Response::new(args.clone()))
}

/// Handler that blocks until the gate opens.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

#[allow(dead_code)]
impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

impl NamedHandler<MemoryConnection> for Gate {
    fn run(&self, _conn: &mut MemoryConnection, args: &Args) -> HandlerResult {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let _open = cvar.wait_while(guard, |open| !*open).unwrap();
        Ok(Response::new(args.clone()))
    }
}

/// Registry with `echo` and a `block` handler tied to `gate`.
pub fn registry(gate: &Gate) -> HandlerRegistry<MemoryConnection> {
    HandlerRegistry::new()
        .with("echo", echo)
        .with("block", gate.clone())
}

/// Connected manager with up to `max` workers.
#[allow(dead_code)]
pub fn manager(max: usize, gate: &Gate, notifier: Arc<dyn WakeNotifier>) -> Manager<MemoryBackend> {
    Manager::connect(
        MemoryBackend::new(),
        registry(gate),
        StoreConfig::default().with_worker_count_max(max),
        notifier,
    )
    .expect("Failed to connect manager")
}

/// Poll `cond` until it holds or the deadline passes.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// In-memory sink for log lines emitted on the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl LogCapture {
    /// Run `f` with a debug-level subscriber writing into this capture.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
