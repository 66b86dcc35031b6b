//! # Batch Contract
//!
//! The capability every model plugged into the engine must provide: a one-time
//! load and a batch prediction. The contract has no concurrency of its own; the
//! worker runtime calls it from a single dedicated thread.
//!
//! ## Usage
//!
//! ```rust
//! use batchbridge::contract::BatchPredictor;
//!
//! struct Shouter {
//!     suffix: String,
//! }
//!
//! impl BatchPredictor for Shouter {
//!     type Config = String;
//!     type Input = String;
//!     type Output = String;
//!     type Error = String;
//!
//!     fn load(config: Self::Config) -> Result<Self, Self::Error> {
//!         Ok(Self { suffix: config })
//!     }
//!
//!     fn predict_batch(&mut self, items: Vec<String>) -> Result<Vec<String>, String> {
//!         Ok(items.into_iter().map(|item| item.to_uppercase() + &self.suffix).collect())
//!     }
//! }
//!
//! let mut model = Shouter::load("!".to_string()).unwrap();
//! assert_eq!(model.predict_batch(vec!["hi".into()]).unwrap(), vec!["HI!".to_string()]);
//! ```

use std::fmt::Display;

/// A model that only runs efficiently on batches.
///
/// The model instance is created on the worker thread and never leaves it, so
/// implementors do not need to be `Send` or `Sync`. Only the configuration,
/// inputs and outputs cross threads.
///
/// ## Implementation Notes
///
/// * [`load`](BatchPredictor::load) runs once, before the worker reports ready.
///   It may be arbitrarily expensive. An `Err` or a panic here is fatal to the worker.
/// * [`predict_batch`](BatchPredictor::predict_batch) must return exactly one output
///   per input, in input order. An `Err`, a panic, or a length mismatch fails every
///   item of that batch with an error reply; the worker keeps serving.
pub trait BatchPredictor: Sized + 'static {
    /// Configuration forwarded verbatim from the engine to [`BatchPredictor::load`]
    type Config: Send + 'static;

    /// A single request item
    type Input: Send + 'static;

    /// A single prediction result
    type Output: Send + 'static;

    /// Failure raised by loading or predicting
    type Error: Display;

    /// Build the model from its configuration.
    fn load(config: Self::Config) -> Result<Self, Self::Error>;

    /// Predict a whole batch. `output[i]` must correspond to `items[i]`.
    fn predict_batch(&mut self, items: Vec<Self::Input>) -> Result<Vec<Self::Output>, Self::Error>;
}

#[cfg(test)]
/// Configurable string predictor used across the crate's tests.
pub(crate) mod mock;
