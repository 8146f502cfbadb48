// src/exec/sleep.rs

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BoxFuture, Reporter, Task};

/// Succeeds once `duration` has elapsed, unless canceled first.
///
/// The wait races a timer against the cancellation token, so `cancel`
/// interrupts it immediately instead of letting the timer run out.
#[derive(Debug)]
pub struct SleepTask {
    duration: Duration,
    cancel: CancellationToken,
}

impl SleepTask {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            cancel: CancellationToken::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Task for SleepTask {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            debug!(duration = ?self.duration, "timer task waiting");

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(duration = ?self.duration, "timer task canceled");
                }
                _ = tokio::time::sleep(self.duration) => {
                    reporter.succeeded().await;
                }
            }
        })
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
