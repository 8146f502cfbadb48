// src/engine/runtime.rs

use std::fmt;

use tracing::{debug, info};

use crate::engine::bridge::{self, BridgeHandle, EventLoop};
use crate::engine::sequence::{Sequence, Stage};
use crate::engine::watcher::Watcher;
use crate::engine::worker::WorkerPool;
use crate::errors::SequenceError;

/// Owns a [`Sequence`] together with the event loop that serves its
/// bridge, and drives both on the calling task.
///
/// The calling task *is* the owning loop: the sequence and its watcher are
/// only touched from inside [`run`](Self::run), while stage tasks execute on
/// the worker pool.
pub struct SequenceRunner<W> {
    sequence: Sequence<W>,
    event_loop: EventLoop<Sequence<W>>,
    bridge: BridgeHandle<Sequence<W>>,
}

impl<W> fmt::Debug for SequenceRunner<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRunner")
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl<W: Watcher + 'static> SequenceRunner<W> {
    /// Build a runner whose workers use the current tokio runtime.
    pub fn new(stages: Vec<Stage>, watcher: W) -> Result<Self, SequenceError> {
        Self::with_pool(stages, watcher, WorkerPool::current()?)
    }

    pub fn with_pool(
        stages: Vec<Stage>,
        watcher: W,
        pool: WorkerPool,
    ) -> Result<Self, SequenceError> {
        let (bridge, event_loop) = bridge::channel();
        let sequence = Sequence::new(stages, watcher, bridge.clone(), pool)?;
        Ok(Self {
            sequence,
            event_loop,
            bridge,
        })
    }

    /// Handle for canceling the sequence from elsewhere.
    pub fn handle(&self) -> SequenceHandle<W> {
        SequenceHandle {
            bridge: self.bridge.clone(),
        }
    }

    pub fn sequence(&self) -> &Sequence<W> {
        &self.sequence
    }

    /// Cancel before the sequence ever runs.
    pub fn cancel(&mut self) {
        self.sequence.cancel();
    }

    /// Start the sequence and serve its bridge until it has settled.
    ///
    /// Returns the settled sequence so the caller can inspect the phase and
    /// take the watcher back.
    pub async fn run(self) -> Result<Sequence<W>, SequenceError> {
        let Self {
            mut sequence,
            event_loop,
            bridge,
        } = self;
        drop(bridge);

        sequence.run()?;
        let sequence = event_loop.run_until(sequence, Sequence::is_settled).await;

        info!(phase = ?sequence.phase(), completed = sequence.completed(), "stage sequence settled");
        Ok(sequence)
    }
}

/// Cloneable, `Send` handle to a running sequence.
pub struct SequenceHandle<W> {
    bridge: BridgeHandle<Sequence<W>>,
}

impl<W> Clone for SequenceHandle<W> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
        }
    }
}

impl<W> fmt::Debug for SequenceHandle<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceHandle")
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl<W: Watcher + 'static> SequenceHandle<W> {
    /// Queue a cancel on the owning loop. Returns `false` if the sequence
    /// has already settled and its loop is gone.
    pub fn cancel(&self) -> bool {
        let posted = self
            .bridge
            .post(|seq: &mut Sequence<W>| seq.cancel())
            .is_ok();
        if !posted {
            debug!("cancel requested after the sequence settled");
        }
        posted
    }
}
