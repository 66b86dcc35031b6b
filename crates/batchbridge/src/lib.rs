//! # Batchbridge
//!
//! An async front end for models that only run efficiently on batches.
//!
//! ## Overview
//!
//! Many callers each want one prediction; the model wants a batch. Batchbridge
//! sits in between: callers `predict` single items, and a dedicated worker
//! thread groups whatever is queued into batches, runs them and routes every
//! result back to the caller that asked for it.
//!
//! Key components include:
//!
//! - A batch contract that models implement ([`BatchPredictor`])
//! - A correlation registry pairing every in-flight item with its caller
//! - Dispatch and collector loops running next to the callers on tokio
//! - A blocking worker runtime on its own OS thread
//! - Pluggable bounded transports between the two sides
//!
//! ## Architecture
//!
//! ```text
//!  callers ──submit──▶ dispatch loop ──Outbound──▶ ┌──────────────┐
//!     ▲                     │ put                  │ worker thread│
//!     │                 registry                   │  batch loop  │
//!     │                     │ take                 │ predict_batch│
//!     └───deliver──── collector loop ◀──Inbound─── └──────────────┘
//! ```
//!
//! The front end and the worker share nothing but the two bounded queues of a
//! [`transport`]. A full outbound queue stalls dispatch rather than dropping
//! items. A failed batch turns into one error reply per item; the worker keeps
//! serving.
//!
//! ## Features
//!
//! - **json** (default) - Enables the [`transport::Json`] transport, which
//!   serializes every message crossing to the worker
//!
//! ## Example
//!
//! ```rust
//! use batchbridge::{AsyncPredictor, BatchPredictor, Engine, EngineConfig};
//!
//! struct Upper;
//!
//! impl BatchPredictor for Upper {
//!     type Config = ();
//!     type Input = String;
//!     type Output = String;
//!     type Error = String;
//!
//!     fn load(_config: ()) -> Result<Self, String> {
//!         Ok(Upper)
//!     }
//!
//!     fn predict_batch(&mut self, items: Vec<String>) -> Result<Vec<String>, String> {
//!         Ok(items.iter().map(|item| item.to_uppercase()).collect())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), batchbridge::EngineError> {
//!     let engine = Engine::<Upper>::with_config(EngineConfig::default().with_batch_size(4), ());
//!     engine.start().await?;
//!
//!     assert_eq!(engine.predict("hello".to_string()).await?, "HELLO");
//!
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```

mod bridge;
mod communication;
mod worker;

pub mod contract;
pub mod engine;
pub mod registry;
pub mod transport;

pub use communication::{CorrelationId, ErrorPayload, Inbound, Outbound, PendingReply, Reply};
pub use contract::BatchPredictor;
pub use engine::{AsyncPredictor, Engine, EngineConfig, EngineError, EngineState, ReadinessPolicy};
