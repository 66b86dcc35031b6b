use std::time::Duration;
use async_trait::async_trait;
use super::EngineError;

/// The caller-facing side of a batching engine: one item in, one prediction out.
///
/// Callers see a plain per-item async call. Batching, correlation and the
/// worker boundary stay behind it.
///
/// # Example
///
/// ```ignore
/// use batchbridge::AsyncPredictor;
///
/// async fn classify<P: AsyncPredictor<String, String>>(engine: &P, text: String) -> String {
///     engine.predict(text).await.unwrap_or_else(|err| format!("unavailable: {err}"))
/// }
/// ```
#[async_trait]
pub trait AsyncPredictor<X, Y>: Send + Sync
where
    X: Send + 'static,
    Y: Send + 'static,
{
    /// Predicts one item with the engine's default deadline.
    async fn predict(&self, item: X) -> Result<Y, EngineError>;

    /// Predicts one item, failing with [`EngineError::Timeout`] once `timeout` elapses.
    ///
    /// # Note
    ///
    /// A timeout does not withdraw the item. It may still be batched and
    /// predicted; the late reply is discarded.
    async fn predict_with_timeout(&self, item: X, timeout: Duration) -> Result<Y, EngineError>;
}
