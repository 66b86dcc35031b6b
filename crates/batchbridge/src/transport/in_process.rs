use std::time::Duration;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use crate::communication::{Inbound, Outbound};
use super::{FrontendLink, LinkError, SendError, Transport, WorkerLink};

/// Typed, bounded crossbeam queues shared between the front end and a worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcess;

pub struct InProcessFrontend<X, Y> {
    outbound: Sender<Outbound<X>>,
    inbound: Receiver<Inbound<Y>>,
}

pub struct InProcessWorker<X, Y> {
    outbound: Receiver<Outbound<X>>,
    inbound: Sender<Inbound<Y>>,
}

impl<X, Y> Transport<X, Y> for InProcess
where
    X: Send + 'static,
    Y: Send + 'static,
{
    type Frontend = InProcessFrontend<X, Y>;
    type Worker = InProcessWorker<X, Y>;

    fn open(capacity: usize) -> (Self::Frontend, Self::Worker) {
        // a zero-capacity crossbeam channel is a rendezvous, never "full but queued"
        let capacity = capacity.max(1);
        let (outbound_tx, outbound_rx) = channel::bounded(capacity);
        let (inbound_tx, inbound_rx) = channel::bounded(capacity);
        (
            InProcessFrontend {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            InProcessWorker {
                outbound: outbound_rx,
                inbound: inbound_tx,
            },
        )
    }
}

impl<X, Y> FrontendLink<X, Y> for InProcessFrontend<X, Y>
where
    X: Send + 'static,
    Y: Send + 'static,
{
    fn try_send(&self, message: Outbound<X>) -> Result<(), SendError<Outbound<X>>> {
        self.outbound.try_send(message).map_err(|err| match err {
            TrySendError::Full(message) => SendError::Full(message),
            TrySendError::Disconnected(message) => SendError::Disconnected(message),
        })
    }

    fn try_recv(&self) -> Result<Option<Inbound<Y>>, LinkError> {
        match self.inbound.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }
}

impl<X, Y> WorkerLink<X, Y> for InProcessWorker<X, Y>
where
    X: Send + 'static,
    Y: Send + 'static,
{
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Outbound<X>>, LinkError> {
        match self.outbound.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    fn try_recv(&self) -> Result<Option<Outbound<X>>, LinkError> {
        match self.outbound.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    fn send(&self, message: Inbound<Y>) -> Result<(), LinkError> {
        self.inbound.send(message).map_err(|_| LinkError::Disconnected)
    }
}
