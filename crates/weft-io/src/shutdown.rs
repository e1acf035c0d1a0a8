//! Shared stop signal for the router's socket and pipeline workers.
//!
//! There is no per-operation cancellation in the forwarding path; the only
//! way a worker exits is process shutdown. [`ShutdownToken`] bundles the
//! watch channel the workers select on with the handles needed to await
//! their teardown.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Coordinates shutdown of the router's background workers.
pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            stop_tx,
            stop_rx,
            task_handles: Mutex::new(Vec::new()),
        }
    }

    /// A receiver each worker holds and checks in its `tokio::select!` loop.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// A sender clone for out-of-band shutdown triggers (signal handlers).
    pub fn trigger(&self) -> watch::Sender<bool> {
        self.stop_tx.clone()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Register a spawned worker to be awaited at teardown.
    pub fn add_task(&self, handle: JoinHandle<()>) {
        self.lock_handles().push(handle);
    }

    /// Signal every subscriber to stop. Idempotent.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Await every registered worker, draining the handle list. Join errors
    /// (panicked workers) are ignored; the process is exiting anyway.
    pub async fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = self.lock_handles().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
