use std::marker::PhantomData;
use std::time::Duration;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use crate::communication::{ErrorPayload, Inbound, Outbound};
use super::{FrontendLink, LinkError, SendError, Transport, WorkerLink};

type Frame = Vec<u8>;

/// Bounded queues of `serde_json` frames.
///
/// Nothing but bytes crosses the boundary, so the front end and the worker share
/// no memory through the messages themselves. This is the shape a pipe- or
/// socket-backed transport to a separate process takes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

pub struct JsonFrontend<X, Y> {
    outbound: Sender<Frame>,
    inbound: Receiver<Frame>,
    _marker: PhantomData<fn(X) -> Y>,
}

pub struct JsonWorker<X, Y> {
    outbound: Receiver<Frame>,
    inbound: Sender<Frame>,
    _marker: PhantomData<fn(Y) -> X>,
}

impl<X, Y> Transport<X, Y> for Json
where
    X: Serialize + DeserializeOwned + Send + 'static,
    Y: Serialize + DeserializeOwned + Send + 'static,
{
    type Frontend = JsonFrontend<X, Y>;
    type Worker = JsonWorker<X, Y>;

    fn open(capacity: usize) -> (Self::Frontend, Self::Worker) {
        let capacity = capacity.max(1);
        let (outbound_tx, outbound_rx) = channel::bounded(capacity);
        let (inbound_tx, inbound_rx) = channel::bounded(capacity);
        (
            JsonFrontend {
                outbound: outbound_tx,
                inbound: inbound_rx,
                _marker: PhantomData,
            },
            JsonWorker {
                outbound: outbound_rx,
                inbound: inbound_tx,
                _marker: PhantomData,
            },
        )
    }
}

fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, LinkError> {
    serde_json::from_slice(frame).map_err(|err| LinkError::Codec(err.to_string()))
}

impl<X, Y> FrontendLink<X, Y> for JsonFrontend<X, Y>
where
    X: Serialize + DeserializeOwned + Send + 'static,
    Y: Serialize + DeserializeOwned + Send + 'static,
{
    fn try_send(&self, message: Outbound<X>) -> Result<(), SendError<Outbound<X>>> {
        let frame = match serde_json::to_vec(&message) {
            Ok(frame) => frame,
            Err(err) => {
                return Err(SendError::Unencodable {
                    message,
                    reason: err.to_string(),
                });
            }
        };
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SendError::Full(message)),
            Err(TrySendError::Disconnected(_)) => Err(SendError::Disconnected(message)),
        }
    }

    fn try_recv(&self) -> Result<Option<Inbound<Y>>, LinkError> {
        match self.inbound.try_recv() {
            Ok(frame) => decode(&frame).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }
}

impl<X, Y> WorkerLink<X, Y> for JsonWorker<X, Y>
where
    X: Serialize + DeserializeOwned + Send + 'static,
    Y: Serialize + DeserializeOwned + Send + 'static,
{
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Outbound<X>>, LinkError> {
        match self.outbound.recv_timeout(timeout) {
            Ok(frame) => decode(&frame).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    fn try_recv(&self) -> Result<Option<Outbound<X>>, LinkError> {
        match self.outbound.try_recv() {
            Ok(frame) => decode(&frame).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    fn send(&self, message: Inbound<Y>) -> Result<(), LinkError> {
        let frame = match serde_json::to_vec(&message) {
            Ok(frame) => frame,
            Err(err) => {
                // the caller still gets exactly one reply for its id
                warn!(id = %message.id, error = %err, "result cannot be encoded; replying with an error");
                let failure = Inbound::<Y>::failed(
                    message.id,
                    ErrorPayload::new(format!("result cannot be encoded: {err}")),
                );
                serde_json::to_vec(&failure).map_err(|err| LinkError::Codec(err.to_string()))?
            }
        };
        self.inbound.send(frame).map_err(|_| LinkError::Disconnected)
    }
}
