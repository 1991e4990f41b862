//! Host wake-up doorbell.
//!
//! Workers ring the notifier after every published result so the host can
//! schedule a [`drain_due`](crate::Manager::drain_due) soon. Rings may be
//! coalesced: one drain always takes every result available, so fewer drains
//! than rings is fine.

use std::sync::mpsc;

/// Cross-thread "please drain soon" signal.
pub trait WakeNotifier: Send + Sync {
    fn wake(&self);
}

/// Notifier for hosts that only drain on their own tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl WakeNotifier for NoopNotifier {
    #[inline]
    fn wake(&self) {}
}

/// Async hosts: `notify.notified().await` then drain.
impl WakeNotifier for tokio::sync::Notify {
    fn wake(&self) {
        // Stores a single permit when nobody is waiting, coalescing rings
        self.notify_one();
    }
}

/// Thread-based hosts: a `sync_channel(1)` drops rings while one is pending.
impl WakeNotifier for mpsc::SyncSender<()> {
    fn wake(&self) {
        let _ = self.try_send(());
    }
}
