use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use stagerun::exec::{BoxFuture, Reporter, Task, TaskOutcome};

/// A fake task whose outcome and timing the test controls.
///
/// - `succeeding()` / `failing()` report immediately.
/// - `gated(outcome)` waits for [`release`](Self::release) or cancellation;
///   a canceled run reports nothing.
/// - `stubborn(outcome)` waits for `release` and then reports even if it
///   was canceled in the meantime, like a task that loses the race against
///   cancellation.
#[derive(Debug)]
pub struct ScriptedTask {
    outcome: TaskOutcome,
    gate: Option<Notify>,
    honor_cancel: bool,
    cancel: CancellationToken,
    started: Notify,
    runs: AtomicUsize,
    cancels: AtomicUsize,
}

impl ScriptedTask {
    fn build(outcome: TaskOutcome, gated: bool, honor_cancel: bool) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            gate: gated.then(Notify::new),
            honor_cancel,
            cancel: CancellationToken::new(),
            started: Notify::new(),
            runs: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::build(TaskOutcome::Succeeded, false, true)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(TaskOutcome::Failed, false, true)
    }

    pub fn with_outcome(outcome: TaskOutcome) -> Arc<Self> {
        Self::build(outcome, false, true)
    }

    pub fn gated(outcome: TaskOutcome) -> Arc<Self> {
        Self::build(outcome, true, true)
    }

    pub fn stubborn(outcome: TaskOutcome) -> Arc<Self> {
        Self::build(outcome, true, false)
    }

    /// Let a gated run report its outcome.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Resolves once `run` has been entered.
    pub async fn wait_started(&self) {
        if self.runs() > 0 {
            return;
        }
        self.started.notified().await;
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Task for ScriptedTask {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();

            if let Some(gate) = &self.gate {
                if self.honor_cancel {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = gate.notified() => {}
                    }
                } else {
                    gate.notified().await;
                }
            } else if self.honor_cancel && self.cancel.is_cancelled() {
                return;
            }

            reporter.report(self.outcome).await;
        })
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }
}
