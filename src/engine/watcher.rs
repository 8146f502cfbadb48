// src/engine/watcher.rs

use std::io::Write;

use tracing::warn;

/// Consumer of stage notifications, called only on the owning loop.
///
/// For one sequence the watcher sees, in declared stage order, one
/// `task_complete` per finished stage followed by exactly one of
/// `tasks_finished` or `task_error`, or nothing further once the sequence
/// was canceled. Implementations must not block.
pub trait Watcher {
    fn task_complete(&mut self, stage: &str);
    fn task_error(&mut self, stage: &str);
    fn tasks_finished(&mut self);
}

/// Prints a progress line per stage to stdout.
#[derive(Debug)]
pub struct ConsoleWatcher {
    total: usize,
    completed: usize,
    failed_stage: Option<String>,
    finished: bool,
}

impl ConsoleWatcher {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed_stage: None,
            finished: false,
        }
    }

    pub fn failed_stage(&self) -> Option<&str> {
        self.failed_stage.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn print(&self, line: std::fmt::Arguments<'_>) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}") {
            warn!(error = %e, "failed to write progress line");
        }
    }
}

impl Watcher for ConsoleWatcher {
    fn task_complete(&mut self, stage: &str) {
        self.completed += 1;
        self.print(format_args!("[{}/{}] {stage}: done", self.completed, self.total));
    }

    fn task_error(&mut self, stage: &str) {
        self.failed_stage = Some(stage.to_string());
        self.print(format_args!(
            "[{}/{}] {stage}: FAILED",
            self.completed + 1,
            self.total
        ));
    }

    fn tasks_finished(&mut self) {
        self.finished = true;
        self.print(format_args!("all {} stages finished", self.total));
    }
}
