// src/engine/sequence.rs

//! Stage sequence state machine.
//!
//! A [`Sequence`] lives on the owning loop and is only ever mutated there:
//! by the caller (`run`, `cancel`) and by bridge calls from its workers
//! (`on_task_outcome`, `on_worker_exit`). It runs one stage at a time and
//! never starts a stage before the previous outcome was handled.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::bridge::BridgeHandle;
use crate::engine::watcher::Watcher;
use crate::engine::worker::{WorkerPool, spawn_stage};
use crate::errors::SequenceError;
use crate::exec::{Task, TaskOutcome, TaskRef};

/// A named unit of work.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub task: TaskRef,
}

impl Stage {
    pub fn new(name: impl Into<String>, task: impl Task + 'static) -> Self {
        Self {
            name: name.into(),
            task: Arc::new(task),
        }
    }

    /// Build a stage around a task the caller keeps a handle to.
    pub fn shared<T: Task + 'static>(name: impl Into<String>, task: Arc<T>) -> Self {
        Self {
            name: name.into(),
            task,
        }
    }
}

/// Where a sequence is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, `run` not called yet.
    Idle,
    /// A stage is in flight.
    Running,
    /// Every stage succeeded.
    Finished,
    /// A stage failed; later stages never ran.
    Failed,
    /// Canceled by the caller.
    Canceled,
}

pub struct Sequence<W> {
    pending: VecDeque<Stage>,
    total: usize,
    index: usize,
    current: Option<Stage>,
    completed: usize,
    phase: Phase,
    live_workers: usize,
    watcher: W,
    bridge: BridgeHandle<Sequence<W>>,
    pool: WorkerPool,
}

impl<W> fmt::Debug for Sequence<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("phase", &self.phase)
            .field("total", &self.total)
            .field("completed", &self.completed)
            .field("current", &self.current_stage())
            .field("live_workers", &self.live_workers)
            .finish_non_exhaustive()
    }
}

impl<W: Watcher + 'static> Sequence<W> {
    /// Create a sequence. `bridge` must belong to the event loop that will
    /// own this sequence.
    pub fn new(
        stages: Vec<Stage>,
        watcher: W,
        bridge: BridgeHandle<Sequence<W>>,
        pool: WorkerPool,
    ) -> Result<Self, SequenceError> {
        if stages.is_empty() {
            return Err(SequenceError::Empty);
        }

        Ok(Self {
            total: stages.len(),
            pending: stages.into(),
            index: 0,
            current: None,
            completed: 0,
            phase: Phase::Idle,
            live_workers: 0,
            watcher,
            bridge,
            pool,
        })
    }

    /// Start the first stage and return without waiting for it.
    ///
    /// Running a sequence canceled before it started does nothing.
    pub fn run(&mut self) -> Result<(), SequenceError> {
        match self.phase {
            Phase::Idle => {
                info!(stages = self.total, "starting stage sequence");
                self.phase = Phase::Running;
                self.start_next();
                Ok(())
            }
            Phase::Canceled => {
                debug!("sequence canceled before start; not running");
                Ok(())
            }
            _ => Err(SequenceError::AlreadyStarted),
        }
    }

    /// Stop the sequence. The in-flight task, if any, is asked to cancel;
    /// the watcher hears nothing more from this sequence.
    pub fn cancel(&mut self) {
        match self.phase {
            Phase::Idle | Phase::Running => {
                if let Some(stage) = &self.current {
                    debug!(stage = %stage.name, index = self.index, "canceling in-flight stage");
                    stage.task.cancel();
                }
                info!(completed = self.completed, total = self.total, "stage sequence canceled");
                self.phase = Phase::Canceled;
            }
            phase => {
                debug!(?phase, "cancel on a settled sequence ignored");
            }
        }
    }

    fn start_next(&mut self) {
        let Some(stage) = self.pending.pop_front() else {
            return;
        };

        self.index = self.total - self.pending.len() - 1;
        debug!(stage = %stage.name, index = self.index, task = ?stage.task, "running stage");

        self.live_workers += 1;
        spawn_stage(
            &self.pool,
            self.bridge.clone(),
            stage.name.clone(),
            self.index,
            Arc::clone(&stage.task),
        );
        self.current = Some(stage);
    }

    /// Outcome of stage `index`, delivered through the bridge.
    pub(crate) fn on_task_outcome(&mut self, index: usize, outcome: TaskOutcome) {
        if self.phase == Phase::Canceled {
            debug!(index, ?outcome, "dropping outcome of canceled sequence");
            return;
        }
        if self.phase != Phase::Running || index != self.index {
            warn!(index, current = self.index, phase = ?self.phase, ?outcome, "dropping stale stage outcome");
            return;
        }
        let Some(stage) = self.current.take() else {
            warn!(index, ?outcome, "outcome without a current stage");
            return;
        };

        match outcome {
            TaskOutcome::Succeeded => {
                self.completed += 1;
                info!(stage = %stage.name, index, "stage complete");
                self.watcher.task_complete(&stage.name);

                if self.pending.is_empty() {
                    info!(stages = self.total, "all stages finished");
                    self.phase = Phase::Finished;
                    self.watcher.tasks_finished();
                } else {
                    self.start_next();
                }
            }
            TaskOutcome::Failed => {
                warn!(stage = %stage.name, index, "stage failed; stopping sequence");
                self.phase = Phase::Failed;
                self.watcher.task_error(&stage.name);
            }
        }
    }

    pub(crate) fn on_worker_exit(&mut self) {
        self.live_workers = self.live_workers.saturating_sub(1);
    }
}

impl<W> Sequence<W> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Finished, failed or canceled.
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Failed | Phase::Canceled)
    }

    /// Terminated and no stage worker is still winding down.
    pub fn is_settled(&self) -> bool {
        self.is_terminated() && self.live_workers == 0
    }

    pub fn stage_count(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn current_stage(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.name.as_str())
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }

    pub fn into_watcher(self) -> W {
        self.watcher
    }
}
