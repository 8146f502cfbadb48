// src/config/mod.rs

//! Stage plan configuration.
//!
//! - [`model`] holds the raw TOML shape and the validated [`PlanFile`].
//! - [`validate`] turns one into the other.
//! - [`loader`] reads plans from disk.
//! - [`duration`] parses `"100ms"` / `"30s"` style durations.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{PlanFile, PlanSection, RawPlanFile, StageConfig, StagePlan, StageSpec};
