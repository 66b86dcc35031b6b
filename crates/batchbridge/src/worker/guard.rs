use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, error};

/// # LivenessGuard
///
/// Marks the worker as dead when the worker thread lets go of it.
///
/// The guard lives on the worker thread's stack for the whole run. When the
/// thread returns, or unwinds from a panic nothing else caught, the guard is
/// dropped and clears the shared `alive` flag, so the front end can tell a
/// crashed worker from one that is merely idle. Panics are reported, not
/// re-raised: the front end is on another thread and keeps serving its callers.
pub(crate) struct LivenessGuard {
    alive: Arc<AtomicBool>,
}

impl LivenessGuard {
    /// Raises the `alive` flag and returns the guard that will lower it.
    pub fn new(alive: Arc<AtomicBool>) -> Self {
        alive.store(true, Ordering::SeqCst);
        Self { alive }
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if thread::panicking() {
            error!("worker thread panicked; no further batches will be served");
        } else {
            debug!("worker thread exited");
        }
    }
}
