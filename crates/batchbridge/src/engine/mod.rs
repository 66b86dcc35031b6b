//! # Engine Facade
//!
//! The public entry point. An [`Engine`] owns one worker thread, the front-end
//! loops that feed it and the registry that pairs every reply with its caller.
//!
//! ## Module Structure
//!
//! * [`core_trait`] - [`AsyncPredictor`], the per-item interface callers program against
//! * [`inference`] - [`Engine`] and its lifecycle
//! * [`config`] - [`EngineConfig`] tuning and the [`ReadinessPolicy`]
//! * [`error`] - [`EngineError`]
//! * [`state`] - [`EngineState`]
mod config;
mod core_trait;
mod error;
mod inference;
mod state;

pub use config::{EngineConfig, ReadinessPolicy};
pub use core_trait::AsyncPredictor;
pub use error::EngineError;
pub use inference::Engine;
pub use state::EngineState;
