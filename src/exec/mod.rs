// src/exec/mod.rs

//! Task execution layer.
//!
//! A [`Task`] is a cancelable unit of possibly slow work that runs on a
//! worker and reports exactly one outcome through a [`Reporter`]:
//!
//! - [`process`] spawns an external command and maps its exit status.
//! - [`sleep`] waits for a fixed duration on an interruptible timer.
//! - [`poll`] polls a predicate until it holds or a timeout elapses.
//!
//! The reporter is consumed by reporting, so a task can report at most once.
//! Returning without reporting is reserved for canceled runs.

pub mod poll;
pub mod process;
pub mod sleep;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use poll::PollTask;
pub use process::ProcessTask;
pub use sleep::SleepTask;

/// Boxed `Send` future, used for the dyn-compatible task traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal outcome of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

/// Receiver of task outcomes.
///
/// The sequence engine implements this by forwarding onto the owning loop;
/// tests implement it by recording.
pub trait TaskObserver: Send + Sync {
    fn task_succeeded(&self) -> BoxFuture<'_, ()>;
    fn task_failed(&self) -> BoxFuture<'_, ()>;
}

/// One-shot handle a task uses to report its outcome.
pub struct Reporter {
    observer: Arc<dyn TaskObserver>,
}

impl Reporter {
    pub fn new(observer: Arc<dyn TaskObserver>) -> Self {
        Self { observer }
    }

    pub async fn succeeded(self) {
        self.observer.task_succeeded().await;
    }

    pub async fn failed(self) {
        self.observer.task_failed().await;
    }

    pub async fn report(self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => self.succeeded().await,
            TaskOutcome::Failed => self.failed().await,
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

/// A cancelable unit of work backing one stage.
///
/// `run` executes on a worker and must report exactly one outcome before
/// returning, unless it was canceled first, in which case it returns without
/// reporting. `cancel` may be called from any thread, any number of times,
/// before, during or after `run`.
pub trait Task: Send + Sync + fmt::Debug {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()>;

    fn cancel(&self);
}

/// Shared task handle, as held by a stage and its worker.
pub type TaskRef = Arc<dyn Task>;
