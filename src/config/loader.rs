// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Load a stage plan from `path` without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawPlanFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a stage plan and validate it: at least one stage, named stages,
/// non-empty commands and well-formed durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    PlanFile::try_from(raw)
}

/// `Stages.toml` in the current working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Stages.toml")
}
