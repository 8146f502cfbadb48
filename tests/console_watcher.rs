// tests/console_watcher.rs

use stagerun::cli::LogLevel;
use stagerun::engine::{ConsoleWatcher, Watcher};
use stagerun::logging::filter_directives;

#[test]
fn console_watcher_tracks_the_terminal_state() {
    let mut ok = ConsoleWatcher::new(2);
    ok.task_complete("gen");
    ok.task_complete("apply");
    ok.tasks_finished();
    assert!(ok.is_finished());
    assert_eq!(ok.failed_stage(), None);

    let mut failed = ConsoleWatcher::new(3);
    failed.task_complete("gen");
    failed.task_error("apply");
    assert!(!failed.is_finished());
    assert_eq!(failed.failed_stage(), Some("apply"));
}

#[test]
fn log_flag_beats_environment() {
    assert_eq!(
        filter_directives(Some(LogLevel::Debug), Some("error")),
        "debug"
    );
    assert_eq!(filter_directives(None, Some(" WARNING ")), "warn");
    assert_eq!(
        filter_directives(None, Some("stagerun::engine=trace,info")),
        "stagerun::engine=trace,info"
    );
    assert_eq!(filter_directives(None, Some("  ")), "info");
    assert_eq!(filter_directives(None, None), "info");
}
