//! # Cross-Boundary Transport
//!
//! Two bounded queues connect the front end to the worker: an outbound queue
//! carrying [`Outbound`] items and an inbound queue carrying [`Inbound`] replies.
//! The dispatch, collector and worker loops only see the link traits below, so
//! the same loops run over any transport that can offer bounded, blocking and
//! non-blocking access from both sides.
//!
//! ## Implementations
//!
//! - [`InProcess`] - typed crossbeam channels, no serialization
//! - [`Json`] - crossbeam channels carrying `serde_json` frames, so only
//!   serializable messages can cross (enabled by the `json` feature)

use std::time::Duration;
use crate::communication::{Inbound, Outbound};

mod in_process;

#[cfg_attr(docsrs, doc(cfg(feature = "json")))]
#[cfg(feature = "json")]
mod json;

pub use in_process::{InProcess, InProcessFrontend, InProcessWorker};

#[cfg(feature = "json")]
pub use json::{Json, JsonFrontend, JsonWorker};

/// Failure to move a message over a link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Every endpoint on the other side has been dropped
    #[error("the other side of the link has hung up")]
    Disconnected,

    /// A frame arrived that could not be decoded
    #[error("failed to decode frame: {0}")]
    Codec(String),
}

/// Failure of a non-blocking send. The message is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SendError<T> {
    /// The queue is at capacity; retry later
    #[error("link is full")]
    Full(T),

    /// The receiving side is gone
    #[error("link is disconnected")]
    Disconnected(T),

    /// The message cannot be represented on this link
    #[error("message cannot be encoded: {reason}")]
    Unencodable { message: T, reason: String },
}

/// The front-end half of a transport: non-blocking in both directions so the
/// cooperative scheduler is never stalled by it.
pub trait FrontendLink<X, Y>: Send + Sync + 'static {
    /// Enqueue an item for the worker without blocking.
    fn try_send(&self, message: Outbound<X>) -> Result<(), SendError<Outbound<X>>>;

    /// Take the next available reply, or `None` if nothing is queued.
    fn try_recv(&self) -> Result<Option<Inbound<Y>>, LinkError>;
}

/// The worker half of a transport: driven from a plain blocking thread.
pub trait WorkerLink<X, Y>: Send + 'static {
    /// Wait up to `timeout` for the next item. `None` means the wait elapsed.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Outbound<X>>, LinkError>;

    /// Take the next item if one is already queued.
    fn try_recv(&self) -> Result<Option<Outbound<X>>, LinkError>;

    /// Enqueue a reply, blocking while the inbound queue is full.
    fn send(&self, message: Inbound<Y>) -> Result<(), LinkError>;
}

/// A way of opening a connected pair of link halves.
pub trait Transport<X, Y> {
    type Frontend: FrontendLink<X, Y>;
    type Worker: WorkerLink<X, Y>;

    /// Open both queues, each bounded to `capacity` messages.
    fn open(capacity: usize) -> (Self::Frontend, Self::Worker);
}
