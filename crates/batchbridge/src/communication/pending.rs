use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::oneshot;
use super::message::Reply;
use crate::engine::EngineError;

/// # PendingReply
///
/// A future resolving to the prediction for one submitted item.
///
/// It carries no deadline of its own; wrap it in `tokio::time::timeout` or use
/// [`AsyncPredictor::predict_with_timeout`](crate::engine::AsyncPredictor::predict_with_timeout).
/// Dropping it does not cancel the work already handed to the worker; the
/// eventual reply is simply discarded.
pub struct PendingReply<Y> {
    /// The underlying single-slot channel
    receiver: oneshot::Receiver<Reply<Y>>,
}

impl<Y> PendingReply<Y> {
    pub(crate) fn new(receiver: oneshot::Receiver<Reply<Y>>) -> Self {
        Self { receiver }
    }
}

impl<Y> Future for PendingReply<Y> {
    type Output = Result<Y, EngineError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let received = ready!(Pin::new(&mut self.get_mut().receiver).poll(cx));
        Poll::Ready(match received {
            Ok(Reply::Ok(value)) => Ok(value),
            Ok(Reply::Failed(payload)) => Err(EngineError::Inference(payload.message)),
            Err(_) => Err(EngineError::Abandoned),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::ErrorPayload;
    use tokio::test;

    #[test]
    async fn test_resolves_to_value() {
        let (tx, rx) = oneshot::channel();
        tx.send(Reply::Ok(7)).unwrap();

        assert_eq!(PendingReply::new(rx).await.unwrap(), 7);
    }

    #[test]
    async fn test_failed_reply_is_inference_error() {
        let (tx, rx) = oneshot::channel::<Reply<i32>>();
        tx.send(Reply::Failed(ErrorPayload::new("bad batch"))).unwrap();

        match PendingReply::new(rx).await {
            Err(EngineError::Inference(message)) => assert_eq!(message, "bad batch"),
            other => panic!("expected an inference error, got {other:?}"),
        }
    }

    #[test]
    async fn test_dropped_slot_is_abandoned() {
        let (tx, rx) = oneshot::channel::<Reply<i32>>();
        drop(tx);

        assert!(matches!(PendingReply::new(rx).await, Err(EngineError::Abandoned)));
    }
}
