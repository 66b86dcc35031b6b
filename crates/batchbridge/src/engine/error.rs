use std::io;
use std::time::Duration;

/// Everything a caller of the [`Engine`](super::Engine) can run into.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The reply did not arrive within the caller's deadline
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The worker failed the batch this item was part of
    #[error("batch prediction failed: {0}")]
    Inference(String),

    /// The engine has not been started, or is shutting down
    #[error("engine is not running")]
    NotRunning,

    /// The engine was stopped and cannot be restarted
    #[error("engine has been stopped")]
    Stopped,

    /// The worker did not report readiness in time
    #[error("worker not ready after {0:?}")]
    NotReady(Duration),

    /// The model failed to load on the worker
    #[error("model failed to load: {0}")]
    ModelLoad(String),

    /// The worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// The request was dropped before a reply could be delivered
    ///
    /// Happens when the worker is gone, when the engine stops with the request
    /// in flight, or when the correlation registry evicts it.
    #[error("request was abandoned before a reply arrived")]
    Abandoned,
}
