use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use stagerun::engine::Watcher;
use stagerun::exec::{BoxFuture, Reporter, TaskObserver, TaskOutcome};

/// One watcher notification, as seen by [`RecordingWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    Complete(String),
    Error(String),
    Finished,
}

impl WatcherEvent {
    pub fn complete(stage: &str) -> Self {
        WatcherEvent::Complete(stage.to_string())
    }

    pub fn error(stage: &str) -> Self {
        WatcherEvent::Error(stage.to_string())
    }
}

/// A watcher that appends every notification to a shared log.
///
/// Clones share the log, so a test can keep one clone while the sequence
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatcher {
    events: Arc<Mutex<Vec<WatcherEvent>>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WatcherEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: WatcherEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Watcher for RecordingWatcher {
    fn task_complete(&mut self, stage: &str) {
        self.push(WatcherEvent::complete(stage));
    }

    fn task_error(&mut self, stage: &str) {
        self.push(WatcherEvent::error(stage));
    }

    fn tasks_finished(&mut self) {
        self.push(WatcherEvent::Finished);
    }
}

/// A task observer that records outcomes, for driving a task directly.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    outcomes: Mutex<Vec<TaskOutcome>>,
    reported: Notify,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reporter(self: &Arc<Self>) -> Reporter {
        Reporter::new(self.clone())
    }

    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Resolves once at least one outcome has been reported.
    pub async fn wait_reported(&self) {
        loop {
            let notified = self.reported.notified();
            if !self.outcomes.lock().unwrap().is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn record(&self, outcome: TaskOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
        self.reported.notify_waiters();
    }
}

impl TaskObserver for RecordingObserver {
    fn task_succeeded(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.record(TaskOutcome::Succeeded) })
    }

    fn task_failed(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.record(TaskOutcome::Failed) })
    }
}
