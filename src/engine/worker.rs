// src/engine/worker.rs

//! Stage workers.
//!
//! Each stage runs as one task on the [`WorkerPool`]. Its outcome travels
//! back to the owning loop through the bridge as a synchronous call, so the
//! worker only returns after the sequence has processed the outcome.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::engine::bridge::BridgeHandle;
use crate::engine::sequence::Sequence;
use crate::engine::watcher::Watcher;
use crate::errors::SequenceError;
use crate::exec::{BoxFuture, Reporter, TaskObserver, TaskOutcome, TaskRef};

/// Where stage tasks run: the tokio runtime's worker threads.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
}

impl WorkerPool {
    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self, SequenceError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|_| SequenceError::NoRuntime)
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut)
    }
}

/// Forwards a stage's outcome onto the owning loop.
struct StageObserver<W> {
    bridge: BridgeHandle<Sequence<W>>,
    index: usize,
    reported: AtomicBool,
}

impl<W: Watcher + 'static> StageObserver<W> {
    fn new(bridge: BridgeHandle<Sequence<W>>, index: usize) -> Self {
        Self {
            bridge,
            index,
            reported: AtomicBool::new(false),
        }
    }

    fn has_reported(&self) -> bool {
        self.reported.load(Ordering::SeqCst)
    }

    async fn deliver(&self, outcome: TaskOutcome) {
        if self.reported.swap(true, Ordering::SeqCst) {
            warn!(index = self.index, ?outcome, "stage reported a second outcome; ignoring");
            return;
        }

        let index = self.index;
        if self
            .bridge
            .call_from_thread(move |seq: &mut Sequence<W>| seq.on_task_outcome(index, outcome))
            .await
            .is_err()
        {
            debug!(index, ?outcome, "owning loop gone; stage outcome dropped");
        }
    }
}

impl<W: Watcher + 'static> TaskObserver for StageObserver<W> {
    fn task_succeeded(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.deliver(TaskOutcome::Succeeded))
    }

    fn task_failed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.deliver(TaskOutcome::Failed))
    }
}

/// Run `task` for stage `index` on the pool.
///
/// A panicking task that has not reported yet is turned into a failure.
/// When the task future is gone the worker posts its exit to the loop.
pub(crate) fn spawn_stage<W: Watcher + 'static>(
    pool: &WorkerPool,
    bridge: BridgeHandle<Sequence<W>>,
    stage: String,
    index: usize,
    task: TaskRef,
) -> JoinHandle<()> {
    let observer = Arc::new(StageObserver::new(bridge.clone(), index));
    let reporter = Reporter::new(observer.clone());
    let inner_pool = pool.clone();

    pool.spawn(async move {
        let joined = inner_pool
            .spawn(async move { task.run(reporter).await })
            .await;

        if let Err(err) = joined {
            if err.is_panic() {
                error!(stage = %stage, index, "stage task panicked");
                if !observer.has_reported() {
                    observer.task_failed().await;
                }
            } else {
                debug!(stage = %stage, index, "stage task aborted");
            }
        }

        debug!(stage = %stage, index, "stage worker finished");
        if bridge
            .post(|seq: &mut Sequence<W>| seq.on_worker_exit())
            .is_err()
        {
            debug!(stage = %stage, index, "owning loop gone before worker exit");
        }
    })
}
