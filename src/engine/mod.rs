// src/engine/mod.rs

//! Stage sequencing engine.
//!
//! This module ties together:
//! - the [`bridge`] that serializes worker effects onto the owning loop
//! - the [`sequence`] state machine (stage order, cancellation, watcher calls)
//! - the [`worker`] side that runs one stage task on the pool
//! - the [`runtime`] shell that drives a sequence and its loop to completion
//!
//! All sequence and watcher state is touched only by the owning loop.

pub mod bridge;
pub mod runtime;
pub mod sequence;
pub mod watcher;
pub mod worker;

pub use bridge::{BridgeHandle, EventLoop};
pub use runtime::{SequenceHandle, SequenceRunner};
pub use sequence::{Phase, Sequence, Stage};
pub use watcher::{ConsoleWatcher, Watcher};
pub use worker::WorkerPool;
