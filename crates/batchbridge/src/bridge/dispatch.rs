use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace, warn};
use crate::communication::{CorrelationId, ErrorPayload, Outbound, Reply, Slot, Submission};
use crate::registry::Registry;
use crate::transport::{FrontendLink, SendError};

/// Moves submitted items onto the outbound link.
///
/// For every submission this loop:
/// 1. Assigns a fresh [`CorrelationId`]
/// 2. Registers the caller's slot under that id
/// 3. Sends the item, backing off for `backoff` whenever the link is full
///
/// A full link stalls admission of further items but never drops one. When the
/// worker side is gone the slot is taken back and dropped, so the caller fails
/// fast instead of waiting for its deadline.
///
/// The loop ends when `running` is cleared or every submission sender is dropped.
/// An item picked up while shutting down is never left registered: its slot is
/// taken back and dropped.
pub(crate) async fn dispatch_loop<X, Y, L>(
    link: Arc<L>,
    registry: Arc<Registry<Slot<Y>>>,
    mut submissions: mpsc::Receiver<Submission<X, Y>>,
    backoff: Duration,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
) where
    L: FrontendLink<X, Y>,
    X: Send + 'static,
    Y: Send + 'static,
{
    while running.load(Ordering::SeqCst) {
        let submission = tokio::select! {
            submission = submissions.recv() => match submission {
                Some(submission) => submission,
                None => break,
            },
            _ = notifier.notified() => continue,
        };

        let (item, slot) = submission.into_parts();
        let id = CorrelationId::new();
        registry.put(id, slot).await;
        // a stop that cleared the registry before this put would never see the entry
        if !running.load(Ordering::SeqCst) {
            let _ = registry.take(&id).await;
            break;
        }
        send_with_backoff(link.as_ref(), &registry, Outbound::new(id, item), backoff, &running).await;
    }
    debug!("dispatch loop stopped");
}

async fn send_with_backoff<X, Y, L>(
    link: &L,
    registry: &Registry<Slot<Y>>,
    mut message: Outbound<X>,
    backoff: Duration,
    running: &AtomicBool,
) where
    L: FrontendLink<X, Y>,
{
    let id = message.id;
    loop {
        match link.try_send(message) {
            Ok(()) => {
                trace!(%id, "dispatched");
                return;
            }
            Err(SendError::Full(returned)) => {
                if !running.load(Ordering::SeqCst) {
                    let _ = registry.take(&id).await;
                    return;
                }
                message = returned;
                tokio::time::sleep(backoff).await;
            }
            Err(SendError::Disconnected(_)) => {
                warn!(%id, "worker link is closed; abandoning request");
                let _ = registry.take(&id).await;
                return;
            }
            Err(SendError::Unencodable { reason, .. }) => {
                warn!(%id, %reason, "request cannot cross the link");
                if let Ok(slot) = registry.take(&id).await {
                    let _ = slot.send(Reply::Failed(ErrorPayload::new(format!(
                        "request cannot be encoded: {reason}"
                    ))));
                }
                return;
            }
        }
    }
}
