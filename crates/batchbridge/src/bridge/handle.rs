//! Ownership of the front end's background loops.

use std::future::Future;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use futures::future::join_all;
use tokio::{task::JoinHandle, sync::Notify};
use tracing::error;

/// A handle over the long-running tasks of one engine: dispatch, collector
/// and registry sweeper.
///
/// Every loop spawned through the handle shares one running flag and one
/// notifier. Shutdown clears the flag and wakes all loops so they can observe it.
///
/// # Example
///
/// ```ignore
/// let mut loops = LoopHandle::new();
/// loops.spawn(|running, notifier| async move {
///     while running.load(Ordering::SeqCst) {
///         tokio::select! {
///             _ = notifier.notified() => {},
///             _ = tokio::time::sleep(Duration::from_millis(5)) => {},
///         }
///     }
/// });
///
/// // loops are also shut down when the handle is dropped
/// loops.shutdown();
/// ```
pub(crate) struct LoopHandle {
    /// Flag indicating whether the loops should continue running
    running: Arc<AtomicBool>,

    /// Handles to the spawned loops, emptied once shutdown is initiated
    handles: Vec<JoinHandle<()>>,

    /// Notification mechanism to wake the loops
    notifier: Arc<Notify>,
}

impl LoopHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            handles: Vec::new(),
            notifier: Arc::new(Notify::new()),
        }
    }

    /// Spawns a loop on the current tokio runtime.
    ///
    /// # Parameters
    ///
    /// * `task` - Builds the loop future from the shared running flag and notifier
    pub fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let future = task(self.running.clone(), self.notifier.clone());
        self.handles.push(tokio::spawn(future));
    }

    #[cfg(test)]
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Initiates a graceful shutdown of every loop.
    ///
    /// This method:
    /// 1. Sets the running flag to `false`
    /// 2. Wakes every loop currently waiting on the notifier
    /// 3. Hands the loop handles to a reaper task that reports any loop that panicked
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_waiters();

        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        // no runtime left to reap on (e.g. dropped after the runtime shut down)
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                for result in join_all(handles).await {
                    if let Err(err) = result {
                        if err.is_panic() {
                            error!(error = %err, "front-end loop panicked");
                        }
                    }
                }
            });
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
