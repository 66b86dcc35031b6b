use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};
use crate::communication::{Inbound, Slot};
use crate::registry::Registry;
use crate::transport::{FrontendLink, LinkError};

/// Routes worker replies back to their callers.
///
/// Each pass drains every reply currently queued on the link and delivers it
/// into the slot registered under its id. A pass that finds nothing sleeps for
/// `poll_interval`; the link offers no async wake-up, and blocking on it would
/// stall the scheduler.
///
/// Replies whose id is no longer registered, or whose caller already stopped
/// waiting, are dropped. The loop ends when `running` is cleared or the worker
/// side of the link is gone.
pub(crate) async fn collect_loop<X, Y, L>(
    link: Arc<L>,
    registry: Arc<Registry<Slot<Y>>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
) where
    L: FrontendLink<X, Y>,
    X: Send + 'static,
    Y: Send + 'static,
{
    while running.load(Ordering::SeqCst) {
        let mut delivered = 0usize;
        loop {
            match link.try_recv() {
                Ok(Some(reply)) => {
                    deliver(&registry, reply).await;
                    delivered += 1;
                }
                Ok(None) => break,
                Err(LinkError::Disconnected) => {
                    warn!("worker link closed; collector stopping");
                    return;
                }
                Err(err) => warn!(error = %err, "dropping unreadable reply"),
            }
        }

        if delivered == 0 {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = notifier.notified() => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
    debug!("collector loop stopped");
}

async fn deliver<Y>(registry: &Registry<Slot<Y>>, reply: Inbound<Y>) {
    let Inbound { id, reply } = reply;
    match registry.take(&id).await {
        Ok(slot) => {
            if slot.send(reply).is_err() {
                debug!(%id, "caller stopped waiting; reply dropped");
            } else {
                trace!(%id, "delivered");
            }
        }
        Err(err) => debug!(error = %err, "unroutable reply dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;
    use crate::communication::{CorrelationId, ErrorPayload, Reply};
    use crate::transport::{InProcess, InProcessWorker, Transport, WorkerLink};

    const TTL: Duration = Duration::from_secs(60);
    const POLL: Duration = Duration::from_micros(500);

    struct Harness {
        registry: Arc<Registry<Slot<String>>>,
        worker: InProcessWorker<String, String>,
        running: Arc<AtomicBool>,
        notifier: Arc<Notify>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start() -> Harness {
        let (frontend, worker) = <InProcess as Transport<String, String>>::open(8);
        let registry = Arc::new(Registry::new(100, TTL));
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let task = tokio::spawn(collect_loop::<String, String, _>(
            Arc::new(frontend),
            registry.clone(),
            POLL,
            running.clone(),
            notifier.clone(),
        ));
        Harness { registry, worker, running, notifier, task }
    }

    async fn register(harness: &Harness) -> (CorrelationId, oneshot::Receiver<Reply<String>>) {
        let id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        harness.registry.put(id, tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn test_replies_reach_their_own_callers() {
        let harness = start();
        let (first, first_rx) = register(&harness).await;
        let (second, second_rx) = register(&harness).await;

        // replies arrive out of submission order
        harness.worker.send(Inbound::ok(second, "two".to_string())).unwrap();
        harness.worker.send(Inbound::failed(first, ErrorPayload::new("boom"))).unwrap();

        assert_eq!(second_rx.await.unwrap(), Reply::Ok("two".to_string()));
        assert_eq!(first_rx.await.unwrap(), Reply::Failed(ErrorPayload::new("boom")));
        assert!(harness.registry.is_empty().await, "Delivered entries are evicted");
    }

    #[tokio::test]
    async fn test_unknown_reply_is_dropped() {
        let harness = start();
        let (id, rx) = register(&harness).await;

        harness.worker.send(Inbound::ok(CorrelationId::new(), "stray".to_string())).unwrap();
        harness.worker.send(Inbound::ok(id, "mine".to_string())).unwrap();

        assert_eq!(rx.await.unwrap(), Reply::Ok("mine".to_string()));
    }

    #[tokio::test]
    async fn test_reply_for_departed_caller_is_evicted() {
        let harness = start();
        let (id, rx) = register(&harness).await;
        drop(rx);

        harness.worker.send(Inbound::ok(id, "late".to_string())).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(harness.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_loop_ends_when_worker_is_gone() {
        let harness = start();
        drop(harness.worker);
        harness.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_ends_on_shutdown() {
        let harness = start();
        tokio::time::sleep(Duration::from_millis(5)).await;

        harness.running.store(false, Ordering::SeqCst);
        harness.notifier.notify_waiters();
        harness.task.await.unwrap();
    }
}
