// src/exec/poll.rs

//! Condition-poll task.
//!
//! Checks a predicate every `interval` until it holds (success), the overall
//! timeout elapses (failure), or the task is canceled (no outcome). The
//! interval wait is interruptible, so cancellation latency stays below one
//! interval.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BoxFuture, Reporter, Task};
use crate::route;

/// Default gap between two predicate checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Predicate checked by a [`PollTask`]. Must be cheap and non-blocking.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

pub struct PollTask {
    label: String,
    predicate: Predicate,
    timeout: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl PollTask {
    pub fn new<F>(label: impl Into<String>, predicate: F, timeout: Duration) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    /// Wait until the host has a default route (IPv4 or IPv6).
    pub fn default_route(timeout: Duration) -> Self {
        Self::new("default-route", route::has_default_route, timeout)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Debug for PollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTask")
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Task for PollTask {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let started = Instant::now();
            // A timeout too large to represent never expires.
            let deadline = started.checked_add(self.timeout);

            loop {
                if self.cancel.is_cancelled() {
                    debug!(label = %self.label, "poll task canceled");
                    return;
                }

                if (self.predicate)() {
                    info!(
                        label = %self.label,
                        elapsed = ?started.elapsed(),
                        "poll condition satisfied"
                    );
                    reporter.succeeded().await;
                    return;
                }

                let now = Instant::now();
                let wait = match deadline {
                    Some(deadline) if now >= deadline => {
                        warn!(label = %self.label, timeout = ?self.timeout, "poll condition timed out");
                        reporter.failed().await;
                        return;
                    }
                    Some(deadline) => self.interval.min(deadline - now),
                    None => self.interval,
                };

                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => {
                        debug!(label = %self.label, "poll task canceled while waiting");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        })
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
