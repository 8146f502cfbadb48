// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::engine::Stage;
use crate::exec::{PollTask, ProcessTask, SleepTask};

/// Stage plan as read from a TOML file.
///
/// ```toml
/// [plan]
/// name = "network-apply"
///
/// [[stage]]
/// name = "generate"
/// kind = "process"
/// cmd = ["netplan", "generate"]
///
/// [[stage]]
/// name = "timeout"
/// kind = "wait_for_default_route"
/// timeout = "30s"
/// ```
///
/// Stages run in the order they appear in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub plan: PlanSection,

    #[serde(default)]
    pub stage: Vec<StageConfig>,
}

/// `[plan]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSection {
    #[serde(default = "default_plan_name")]
    pub name: String,
}

fn default_plan_name() -> String {
    "stages".to_string()
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            name: default_plan_name(),
        }
    }
}

/// One `[[stage]]` entry, selected by its `kind` key.
///
/// Durations stay strings here; [`validate`](super::validate) parses them.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    /// Run an external command; exit status 0 is success.
    Process {
        name: String,
        cmd: Vec<String>,
        /// Text written to the command's stdin.
        #[serde(default)]
        input: Option<String>,
        #[serde(default)]
        timeout: Option<String>,
    },

    /// Wait for a fixed duration.
    Sleep { name: String, duration: String },

    /// Poll until the host has a default route.
    WaitForDefaultRoute {
        name: String,
        timeout: String,
        #[serde(default)]
        interval: Option<String>,
    },
}

impl StageConfig {
    pub fn name(&self) -> &str {
        match self {
            StageConfig::Process { name, .. }
            | StageConfig::Sleep { name, .. }
            | StageConfig::WaitForDefaultRoute { name, .. } => name,
        }
    }
}

/// Validated plan: at least one stage, all durations parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFile {
    pub name: String,
    pub stages: Vec<StagePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub name: String,
    pub spec: StageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    Process {
        cmd: Vec<String>,
        input: Option<String>,
        timeout: Option<Duration>,
    },
    Sleep {
        duration: Duration,
    },
    WaitForDefaultRoute {
        timeout: Duration,
        interval: Duration,
    },
}

impl PlanFile {
    /// Build without validation; callers guarantee the invariants.
    pub(crate) fn new_unchecked(name: String, stages: Vec<StagePlan>) -> Self {
        Self { name, stages }
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    /// Instantiate fresh tasks for every stage.
    pub fn build_stages(&self) -> Vec<Stage> {
        self.stages.iter().map(StagePlan::build).collect()
    }
}

impl StagePlan {
    pub fn new(name: impl Into<String>, spec: StageSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    pub fn build(&self) -> Stage {
        match &self.spec {
            StageSpec::Process {
                cmd,
                input,
                timeout,
            } => {
                let mut task = ProcessTask::new(cmd.iter().cloned());
                if let Some(input) = input {
                    task = task.with_input(input.as_bytes());
                }
                if let Some(timeout) = timeout {
                    task = task.with_timeout(*timeout);
                }
                Stage::new(&self.name, task)
            }
            StageSpec::Sleep { duration } => Stage::new(&self.name, SleepTask::new(*duration)),
            StageSpec::WaitForDefaultRoute { timeout, interval } => Stage::new(
                &self.name,
                PollTask::default_route(*timeout).with_interval(*interval),
            ),
        }
    }
}
