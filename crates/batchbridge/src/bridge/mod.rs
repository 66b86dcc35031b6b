//! # Front-End Bridge
//!
//! The cooperative half of the engine. Everything here runs as tokio tasks next
//! to the callers it serves.
//!
//! ## Module Structure
//!
//! * [`dispatch`] - Pulls submitted items, registers their delivery slots and
//!   pushes them onto the outbound link, applying backpressure while it is full.
//!
//! * [`collect`] - Drains replies from the inbound link and delivers each into the
//!   slot registered under its correlation id.
//!
//! * [`handle`] - Owns the spawned loops and shuts them down together.
mod collect;
mod dispatch;
mod handle;

pub(crate) use collect::collect_loop;
pub(crate) use dispatch::dispatch_loop;
pub(crate) use handle::LoopHandle;
