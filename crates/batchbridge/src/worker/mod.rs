//! # Worker Runtime
//!
//! The blocking half of the engine. The model is loaded and driven on one
//! dedicated OS thread, away from the cooperative scheduler, so a slow
//! `predict_batch` never stalls the callers waiting on it.
//!
//! * [`runtime`] - Spawns the worker thread, reports readiness and runs the batch loop
//! * [`guard`] - Clears the shared liveness flag however the thread exits
mod guard;
mod runtime;

pub(crate) use runtime::{spawn_worker, WorkerHandle, WorkerSettings};
