#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use stagerun::config::{PlanFile, PlanSection, RawPlanFile, StageConfig};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                plan: PlanSection::default(),
                stage: Vec::new(),
            },
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.plan.plan.name = name.to_string();
        self
    }

    pub fn process(self, name: &str, cmd: &[&str]) -> Self {
        self.with_stage(StageBuilder::process(name, cmd).build())
    }

    pub fn sleep(self, name: &str, duration: &str) -> Self {
        self.with_stage(StageBuilder::sleep(name, duration).build())
    }

    pub fn wait_for_default_route(self, name: &str, timeout: &str) -> Self {
        self.with_stage(StageBuilder::wait_for_default_route(name, timeout).build())
    }

    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.plan.stage.push(stage);
        self
    }

    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single `StageConfig`.
pub struct StageBuilder {
    stage: StageConfig,
}

impl StageBuilder {
    pub fn process(name: &str, cmd: &[&str]) -> Self {
        Self {
            stage: StageConfig::Process {
                name: name.to_string(),
                cmd: cmd.iter().map(|s| s.to_string()).collect(),
                input: None,
                timeout: None,
            },
        }
    }

    pub fn sleep(name: &str, duration: &str) -> Self {
        Self {
            stage: StageConfig::Sleep {
                name: name.to_string(),
                duration: duration.to_string(),
            },
        }
    }

    pub fn wait_for_default_route(name: &str, timeout: &str) -> Self {
        Self {
            stage: StageConfig::WaitForDefaultRoute {
                name: name.to_string(),
                timeout: timeout.to_string(),
                interval: None,
            },
        }
    }

    pub fn input(mut self, text: &str) -> Self {
        if let StageConfig::Process { input, .. } = &mut self.stage {
            *input = Some(text.to_string());
        }
        self
    }

    pub fn timeout(mut self, value: &str) -> Self {
        match &mut self.stage {
            StageConfig::Process { timeout, .. } => *timeout = Some(value.to_string()),
            StageConfig::WaitForDefaultRoute { timeout, .. } => *timeout = value.to_string(),
            StageConfig::Sleep { .. } => {}
        }
        self
    }

    pub fn interval(mut self, value: &str) -> Self {
        if let StageConfig::WaitForDefaultRoute { interval, .. } = &mut self.stage {
            *interval = Some(value.to_string());
        }
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}

/// Write `contents` as `Stages.toml` inside `dir` and return its path.
pub fn write_plan_file(dir: &Path, contents: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("Stages.toml");
    fs::write(&path, contents)?;
    Ok(path)
}
