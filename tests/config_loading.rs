// tests/config_loading.rs

use std::error::Error;
use std::time::Duration;

use stagerun::config::duration::parse_duration;
use stagerun::config::{PlanFile, StageSpec, load_and_validate, load_from_path};
use stagerun::engine::{Phase, SequenceRunner};
use stagerun::errors::StagerunError;
use stagerun_test_utils::builders::{PlanBuilder, StageBuilder, write_plan_file};
use stagerun_test_utils::{RecordingWatcher, WatcherEvent, init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn full_plan_file_is_loaded_in_order() -> TestResult {
    let dir = tempdir()?;
    let path = write_plan_file(
        dir.path(),
        r#"
[plan]
name = "network-apply"

[[stage]]
name = "generate"
kind = "process"
cmd = ["netplan", "generate"]

[[stage]]
name = "apply"
kind = "process"
cmd = ["netplan", "apply"]
input = "yes\n"
timeout = "2m"

[[stage]]
name = "settle"
kind = "sleep"
duration = "250ms"

[[stage]]
name = "timeout"
kind = "wait_for_default_route"
timeout = "30s"
interval = "1s"
"#,
    )?;

    let plan = load_and_validate(&path)?;

    assert_eq!(plan.name, "network-apply");
    assert_eq!(
        plan.stage_names().collect::<Vec<_>>(),
        vec!["generate", "apply", "settle", "timeout"]
    );
    assert_eq!(
        plan.stages[1].spec,
        StageSpec::Process {
            cmd: vec!["netplan".into(), "apply".into()],
            input: Some("yes\n".into()),
            timeout: Some(Duration::from_secs(120)),
        }
    );
    assert_eq!(
        plan.stages[2].spec,
        StageSpec::Sleep {
            duration: Duration::from_millis(250)
        }
    );
    assert_eq!(
        plan.stages[3].spec,
        StageSpec::WaitForDefaultRoute {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
        }
    );

    Ok(())
}

#[test]
fn plan_name_and_interval_have_defaults() -> TestResult {
    let dir = tempdir()?;
    let path = write_plan_file(
        dir.path(),
        r#"
[[stage]]
name = "route"
kind = "wait_for_default_route"
timeout = "5s"

[[stage]]
name = "quick"
kind = "wait_for_default_route"
timeout = "40ms"
"#,
    )?;

    let plan = load_and_validate(&path)?;

    assert_eq!(plan.name, "stages");
    assert_eq!(
        plan.stages[0].spec,
        StageSpec::WaitForDefaultRoute {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(100),
        }
    );
    assert_eq!(
        plan.stages[1].spec,
        StageSpec::WaitForDefaultRoute {
            timeout: Duration::from_millis(40),
            interval: Duration::from_millis(40),
        },
        "the default interval never exceeds the timeout"
    );

    Ok(())
}

#[test]
fn plan_without_stages_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let path = write_plan_file(dir.path(), "[plan]\nname = \"empty\"\n")?;

    // Parses fine, fails validation.
    assert!(load_from_path(&path)?.stage.is_empty());
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, StagerunError::ConfigError(_)), "got {err:?}");

    Ok(())
}

#[test]
fn unknown_stage_kind_is_a_toml_error() -> TestResult {
    let dir = tempdir()?;
    let path = write_plan_file(
        dir.path(),
        "[[stage]]\nname = \"x\"\nkind = \"teleport\"\n",
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, StagerunError::TomlError(_)), "got {err:?}");

    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/nonexistent/stagerun/Stages.toml").unwrap_err();
    assert!(matches!(err, StagerunError::IoError(_)), "got {err:?}");
}

fn rejected(builder: PlanBuilder) -> String {
    match PlanFile::try_from(builder.raw()) {
        Err(StagerunError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn invalid_stages_are_rejected() {
    let msg = rejected(PlanBuilder::new().process("  ", &["true"]));
    assert!(msg.contains("empty name"), "{msg}");

    let msg = rejected(PlanBuilder::new().process("nothing", &[]));
    assert!(msg.contains("`cmd`"), "{msg}");

    let msg = rejected(PlanBuilder::new().process("blank", &[" ", "arg"]));
    assert!(msg.contains("`cmd`"), "{msg}");

    let msg = rejected(PlanBuilder::new().sleep("nap", "ten"));
    assert!(msg.contains("`duration`"), "{msg}");

    let msg = rejected(PlanBuilder::new().with_stage(
        StageBuilder::process("slow", &["true"]).timeout("5 parsecs").build(),
    ));
    assert!(msg.contains("`timeout`"), "{msg}");

    let msg = rejected(PlanBuilder::new().with_stage(
        StageBuilder::wait_for_default_route("route", "1s").interval("0ms").build(),
    ));
    assert!(msg.contains("greater than zero"), "{msg}");

    let msg = rejected(PlanBuilder::new().with_stage(
        StageBuilder::wait_for_default_route("route", "1s").interval("2s").build(),
    ));
    assert!(msg.contains("exceeds"), "{msg}");
}

#[test]
fn stage_names_are_trimmed() {
    let plan = PlanBuilder::new().named("p").process("  gen  ", &["true"]).build();
    assert_eq!(plan.stage_names().collect::<Vec<_>>(), vec!["gen"]);
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_duration("10S"), Ok(Duration::from_secs(10)));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn oversized_durations_are_rejected_not_panicking() {
    let err = parse_duration("307445734561825861h").unwrap_err();
    assert!(err.contains("out of range"), "{err}");
    assert!(parse_duration("307445734561825861m").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );
}

#[test]
fn oversized_timeout_in_a_plan_is_a_config_error() -> TestResult {
    let dir = tempdir()?;
    let path = write_plan_file(
        dir.path(),
        r#"
[[stage]]
name = "route"
kind = "wait_for_default_route"
timeout = "307445734561825861h"
"#,
    )?;

    let err = load_and_validate(&path).unwrap_err();
    assert!(
        matches!(&err, StagerunError::ConfigError(msg) if msg.contains("out of range")),
        "got {err:?}"
    );

    Ok(())
}

#[tokio::test]
async fn built_plan_runs_as_a_sequence() -> TestResult {
    init_tracing();

    let plan = PlanBuilder::new()
        .process("first", &["true"])
        .sleep("pause", "20ms")
        .with_stage(
            StageBuilder::process("check", &["sh", "-c", "read x; test \"$x\" = ok"])
                .input("ok\n")
                .timeout("5s")
                .build(),
        )
        .process("last", &["false"])
        .build();

    let watcher = RecordingWatcher::new();
    let runner = SequenceRunner::new(plan.build_stages(), watcher.clone())?;
    let sequence = with_timeout(runner.run()).await?;

    assert_eq!(sequence.phase(), Phase::Failed);
    assert_eq!(
        watcher.events(),
        vec![
            WatcherEvent::complete("first"),
            WatcherEvent::complete("pause"),
            WatcherEvent::complete("check"),
            WatcherEvent::error("last"),
        ]
    );

    Ok(())
}
