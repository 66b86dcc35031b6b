use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use crate::communication::{ErrorPayload, Inbound, Outbound};
use crate::contract::BatchPredictor;
use crate::transport::{LinkError, WorkerLink};
use super::guard::LivenessGuard;

/// One-shot readiness signal: `Ok` once the model is loaded, `Err` with the
/// load failure otherwise.
pub(crate) type Readiness = oneshot::Sender<Result<(), String>>;

/// Sizing of the worker's batching loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    /// Upper bound on items per `predict_batch` call
    pub batch_size: usize,

    /// How long one wait for a first item may block before shutdown is re-checked
    pub idle_wait: Duration,
}

/// Handle to a running worker thread.
///
/// Dropping the handle requests shutdown but never joins: the thread exits on
/// its own once it notices the request or its link is closed.
pub(crate) struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Asks the worker to return after its current wait or batch.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Blocks until the worker thread has exited.
    #[cfg(test)]
    pub fn join(mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.request_shutdown();
        if let Some(thread) = self.thread.take() {
            if !thread.is_finished() {
                debug!("worker thread detached; it exits after its current wait or batch");
            }
        }
    }
}

/// Spawns the worker on a dedicated thread.
///
/// The thread loads the model, reports readiness and then serves batches until
/// shutdown is requested or the front end hangs up. A failed load is reported
/// over `ready` and ends the thread.
pub(crate) fn spawn_worker<P, L>(
    link: L,
    settings: WorkerSettings,
    config: P::Config,
    ready: Readiness,
    alive: Arc<AtomicBool>,
) -> io::Result<WorkerHandle>
where
    P: BatchPredictor,
    L: WorkerLink<P::Input, P::Output>,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let thread = thread::Builder::new()
        .name("batchbridge-worker".to_string())
        .spawn({
            let shutdown = shutdown.clone();
            move || {
                let _guard = LivenessGuard::new(alive);
                // released before the guard, so a dead worker never holds its link
                let link = link;

                let mut model = match load_model::<P>(config) {
                    Ok(model) => model,
                    Err(reason) => {
                        error!(%reason, "model failed to load");
                        let _ = ready.send(Err(reason));
                        return;
                    }
                };
                if ready.send(Ok(())).is_err() {
                    warn!("nobody is waiting for readiness");
                }
                info!(batch_size = settings.batch_size, "worker ready");

                batch_loop(&mut model, &link, settings, &shutdown);
            }
        })?;

    Ok(WorkerHandle {
        shutdown,
        thread: Some(thread),
    })
}

fn load_model<P: BatchPredictor>(config: P::Config) -> Result<P, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| P::load(config))) {
        Ok(Ok(model)) => Ok(model),
        Ok(Err(err)) => Err(err.to_string()),
        Err(panic) => Err(format!("load panicked: {}", panic_message(panic.as_ref()))),
    }
}

/// The worker's only job: collect a batch, predict it, reply for every item.
///
/// Each iteration:
/// 1. Waits up to `idle_wait` for a first item, re-checking `shutdown` on every timeout
/// 2. Greedily takes whatever else is already queued, up to `batch_size`
/// 3. Runs the batch and sends one reply per item, in order
///
/// The loop never waits to fill a batch beyond what is already queued, which
/// favours latency over batch packing.
pub(crate) fn batch_loop<P, L>(
    model: &mut P,
    link: &L,
    settings: WorkerSettings,
    shutdown: &AtomicBool,
) where
    P: BatchPredictor,
    L: WorkerLink<P::Input, P::Output>,
{
    let batch_size = settings.batch_size.max(1);
    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("worker shutdown requested");
            return;
        }

        let first = match link.recv_timeout(settings.idle_wait) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(LinkError::Disconnected) => {
                info!("front end hung up; worker stopping");
                return;
            }
            Err(err) => {
                warn!(error = %err, "dropping unreadable request");
                continue;
            }
        };

        let mut batch = Vec::with_capacity(batch_size);
        batch.push(first);
        while batch.len() < batch_size {
            match link.try_recv() {
                Ok(Some(message)) => batch.push(message),
                Ok(None) | Err(LinkError::Disconnected) => break,
                Err(err) => warn!(error = %err, "dropping unreadable request"),
            }
        }

        debug!(batch = batch.len(), "running batch");
        for reply in run_batch(model, batch) {
            if link.send(reply).is_err() {
                info!("front end hung up; worker stopping");
                return;
            }
        }
    }
}

/// Predicts one batch, pairing every output with its item's id.
///
/// Any failure of the batch (an `Err`, a panic, or the wrong number of outputs)
/// yields one failure reply per item, so no caller is left without an answer.
pub(crate) fn run_batch<P: BatchPredictor>(
    model: &mut P,
    batch: Vec<Outbound<P::Input>>,
) -> Vec<Inbound<P::Output>> {
    let (ids, items): (Vec<_>, Vec<_>) = batch
        .into_iter()
        .map(|message| (message.id, message.item))
        .unzip();
    let expected = ids.len();

    let failure = match panic::catch_unwind(AssertUnwindSafe(|| model.predict_batch(items))) {
        Ok(Ok(outputs)) if outputs.len() == expected => {
            return ids
                .into_iter()
                .zip(outputs)
                .map(|(id, output)| Inbound::ok(id, output))
                .collect();
        }
        Ok(Ok(outputs)) => format!(
            "predict_batch returned {} outputs for {} inputs",
            outputs.len(),
            expected
        ),
        Ok(Err(err)) => err.to_string(),
        Err(panic) => format!("predict_batch panicked: {}", panic_message(panic.as_ref())),
    };

    error!(batch = expected, %failure, "batch prediction failed");
    let payload = ErrorPayload::new(failure);
    ids.into_iter()
        .map(|id| Inbound::failed(id, payload.clone()))
        .collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
