// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_plan_path;
use crate::types::BuiltinPlan;

/// Command-line arguments for `stagerun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagerun",
    version,
    about = "Run a plan of named stages one at a time, with progress and cancellation.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the stage plan (TOML).
    ///
    /// Default: `Stages.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_plan_path())]
    pub plan: PathBuf,

    /// Run a built-in plan instead of a plan file
    /// (`network-apply` or `dry-run`).
    ///
    /// `dry-run` rehearses the error path: its first attempt fails on
    /// purpose and is retried once with a plan that should succeed.
    #[arg(long, value_name = "NAME", conflicts_with = "plan")]
    pub builtin: Option<BuiltinPlan>,

    /// Target root for files written before the plan runs.
    #[arg(long, value_name = "DIR", default_value = "/")]
    pub root: PathBuf,

    /// Network configuration to install atomically under `--root` before
    /// running the plan.
    #[arg(long, value_name = "FILE")]
    pub netplan: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan, but don't run any stage.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
