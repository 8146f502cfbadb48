// tests/sequence_order.rs

use std::error::Error;
use std::time::Duration;

use stagerun::engine::{Phase, Sequence, SequenceRunner, Stage, WorkerPool, bridge};
use stagerun::errors::SequenceError;
use stagerun::exec::{BoxFuture, PollTask, ProcessTask, Reporter, SleepTask, Task};
use stagerun_test_utils::{
    RecordingWatcher, ScriptedTask, WatcherEvent, init_tracing, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn all_stages_succeed_in_declared_order() -> TestResult {
    init_tracing();

    let names = ["one", "two", "three", "four"];
    let tasks: Vec<_> = names.iter().map(|_| ScriptedTask::succeeding()).collect();
    let stages = names
        .iter()
        .zip(&tasks)
        .map(|(name, task)| Stage::shared(*name, task.clone()))
        .collect();

    let watcher = RecordingWatcher::new();
    let runner = SequenceRunner::new(stages, watcher.clone())?;
    let sequence = with_timeout(runner.run()).await?;

    assert_eq!(sequence.phase(), Phase::Finished);
    assert_eq!(sequence.completed(), 4);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("one"),
            WatcherEvent::complete("two"),
            WatcherEvent::complete("three"),
            WatcherEvent::complete("four"),
            WatcherEvent::Finished,
        ]
    );
    assert!(tasks.iter().all(|t| t.runs() == 1));

    Ok(())
}

#[tokio::test]
async fn failing_stage_stops_the_sequence() -> TestResult {
    init_tracing();

    let first = ScriptedTask::succeeding();
    let second = ScriptedTask::succeeding();
    let broken = ScriptedTask::failing();
    let never = ScriptedTask::succeeding();

    let stages = vec![
        Stage::shared("first", first.clone()),
        Stage::shared("second", second.clone()),
        Stage::shared("broken", broken.clone()),
        Stage::shared("never", never.clone()),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("first"),
            WatcherEvent::complete("second"),
            WatcherEvent::error("broken"),
        ]
    );
    assert_eq!(never.runs(), 0, "stages after a failure must not run");

    Ok(())
}

#[tokio::test]
async fn first_stage_failure_reports_only_the_error() -> TestResult {
    init_tracing();

    let watcher = RecordingWatcher::new();
    let stages = vec![
        Stage::shared("only", ScriptedTask::failing()),
        Stage::shared("later", ScriptedTask::succeeding()),
    ];
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(sequence.completed(), 0);
    assert_eq!(watcher.events(), vec![WatcherEvent::error("only")]);

    Ok(())
}

#[tokio::test]
async fn empty_sequence_is_rejected() {
    let result = SequenceRunner::new(Vec::new(), RecordingWatcher::new());
    assert_eq!(result.err(), Some(SequenceError::Empty));
}

#[tokio::test]
async fn running_twice_is_rejected() -> TestResult {
    init_tracing();

    let task = ScriptedTask::succeeding();
    let watcher = RecordingWatcher::new();
    let (handle, event_loop) = bridge::channel();
    let mut sequence = Sequence::new(
        vec![Stage::shared("once", task.clone())],
        watcher.clone(),
        handle,
        WorkerPool::current()?,
    )?;

    assert_eq!(sequence.phase(), Phase::Idle);
    sequence.run()?;
    assert_eq!(sequence.run(), Err(SequenceError::AlreadyStarted));
    assert_eq!(sequence.current_stage(), Some("once"));

    let sequence = with_timeout(event_loop.run_until(sequence, Sequence::is_settled)).await;

    assert_eq!(sequence.phase(), Phase::Finished);
    assert_eq!(sequence.stage_count(), 1);
    assert_eq!(task.runs(), 1);
    assert_eq!(
        sequence.into_watcher().events(),
        vec![WatcherEvent::complete("once"), WatcherEvent::Finished]
    );

    Ok(())
}

#[test]
fn runner_outside_a_runtime_is_rejected() {
    let stages = vec![Stage::shared("one", ScriptedTask::succeeding())];
    let result = SequenceRunner::new(stages, RecordingWatcher::new());
    assert_eq!(result.err(), Some(SequenceError::NoRuntime));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn real_tasks_run_in_order() -> TestResult {
    init_tracing();

    let stages = vec![
        Stage::new("gen", ProcessTask::new(["true"])),
        Stage::new("settle", SleepTask::new(Duration::from_millis(50))),
        Stage::new(
            "ready",
            PollTask::new("always", || true, Duration::from_secs(1)),
        ),
        Stage::new("apply", ProcessTask::new(["sh", "-c", "exit 0"])),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Finished);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("gen"),
            WatcherEvent::complete("settle"),
            WatcherEvent::complete("ready"),
            WatcherEvent::complete("apply"),
            WatcherEvent::Finished,
        ]
    );

    Ok(())
}

/// generate ok, apply ok, then a connectivity wait that never succeeds.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connectivity_timeout_fails_the_last_stage() -> TestResult {
    init_tracing();

    let stages = vec![
        Stage::new("gen", ProcessTask::new(["true"])),
        Stage::new("apply", ProcessTask::new(["true"])),
        Stage::new(
            "timeout",
            PollTask::new("never", || false, Duration::from_secs(1)),
        ),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("gen"),
            WatcherEvent::complete("apply"),
            WatcherEvent::error("timeout"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn nonzero_exit_is_a_stage_error() -> TestResult {
    init_tracing();

    let stages = vec![
        Stage::new("ok", ProcessTask::new(["true"])),
        Stage::new("fail", ProcessTask::new(["false"])),
        Stage::new("skipped", ProcessTask::new(["true"])),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(
        watcher.events(),
        vec![WatcherEvent::complete("ok"), WatcherEvent::error("fail")]
    );

    Ok(())
}

#[tokio::test]
async fn duplicate_stage_names_are_allowed() -> TestResult {
    init_tracing();

    let stages = vec![
        Stage::shared("step", ScriptedTask::succeeding()),
        Stage::shared("step", ScriptedTask::succeeding()),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Finished);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("step"),
            WatcherEvent::complete("step"),
            WatcherEvent::Finished,
        ]
    );

    Ok(())
}

#[derive(Debug)]
struct ExplodingTask {
    explode: bool,
}

impl Task for ExplodingTask {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.explode {
                panic!("stage task exploded");
            }
            reporter.succeeded().await;
        })
    }

    fn cancel(&self) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_fails_its_stage() -> TestResult {
    init_tracing();

    let later = ScriptedTask::succeeding();
    let stages = vec![
        Stage::new("calm", ExplodingTask { explode: false }),
        Stage::new("boom", ExplodingTask { explode: true }),
        Stage::shared("later", later.clone()),
    ];

    let watcher = RecordingWatcher::new();
    let sequence = with_timeout(SequenceRunner::new(stages, watcher.clone())?.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(
        watcher.events(),
        vec![WatcherEvent::complete("calm"), WatcherEvent::error("boom")]
    );
    assert_eq!(later.runs(), 0);

    Ok(())
}
