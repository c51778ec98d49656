//! Shutdown signaling for the gateway process.

use tokio::sync::broadcast;

/// Fire-once shutdown signal connecting the signal handler (or a test
/// harness) to the serve loop.
///
/// Cloning shares the same underlying signal. Watchers must be taken before
/// the trigger fires; the signal is not replayed to late subscribers.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // Capacity 1: a single () is all that is ever sent.
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a task that should drain when shutdown is requested.
    pub fn watch(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request shutdown. Idempotent; having no watcher yet is not an error.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
