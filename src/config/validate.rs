// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{PlanFile, RawPlanFile, StageConfig, StagePlan, StageSpec};
use crate::errors::{Result, StagerunError};
use crate::exec::poll::DEFAULT_POLL_INTERVAL;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = StagerunError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_stages(&raw)?;

        let stages = raw
            .stage
            .iter()
            .enumerate()
            .map(|(i, stage)| validate_stage(i, stage))
            .collect::<Result<Vec<_>>>()?;

        Ok(PlanFile::new_unchecked(raw.plan.name, stages))
    }
}

fn ensure_has_stages(raw: &RawPlanFile) -> Result<()> {
    if raw.stage.is_empty() {
        return Err(StagerunError::ConfigError(
            "plan must contain at least one [[stage]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_stage(index: usize, stage: &StageConfig) -> Result<StagePlan> {
    let name = stage.name().trim();
    if name.is_empty() {
        return Err(StagerunError::ConfigError(format!(
            "stage #{} has an empty name",
            index + 1
        )));
    }

    let spec = match stage {
        StageConfig::Process {
            cmd,
            input,
            timeout,
            ..
        } => {
            if cmd.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(StagerunError::ConfigError(format!(
                    "stage '{name}': `cmd` must name a program"
                )));
            }
            let timeout = timeout
                .as_deref()
                .map(|t| duration_field(name, "timeout", t))
                .transpose()?;
            StageSpec::Process {
                cmd: cmd.clone(),
                input: input.clone(),
                timeout,
            }
        }

        StageConfig::Sleep { duration, .. } => StageSpec::Sleep {
            duration: duration_field(name, "duration", duration)?,
        },

        StageConfig::WaitForDefaultRoute {
            timeout, interval, ..
        } => {
            let timeout = duration_field(name, "timeout", timeout)?;
            let interval = match interval {
                Some(i) => duration_field(name, "interval", i)?,
                None => DEFAULT_POLL_INTERVAL.min(timeout),
            };
            if interval.is_zero() {
                return Err(StagerunError::ConfigError(format!(
                    "stage '{name}': `interval` must be greater than zero"
                )));
            }
            if interval > timeout {
                return Err(StagerunError::ConfigError(format!(
                    "stage '{name}': `interval` ({interval:?}) exceeds `timeout` ({timeout:?})"
                )));
            }
            StageSpec::WaitForDefaultRoute { timeout, interval }
        }
    };

    Ok(StagePlan::new(name, spec))
}

fn duration_field(stage: &str, field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| StagerunError::ConfigError(format!("stage '{stage}': `{field}`: {e}")))
}
