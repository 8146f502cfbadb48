// src/logging.rs

//! Logging setup for `stagerun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `STAGERUN_LOG` environment variable, either a bare level ("debug")
//!    or full directives ("stagerun::engine=trace,info")
//! 3. default to `info`
//!
//! Logs go to STDERR; stage progress is printed on STDOUT.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "STAGERUN_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let directives = filter_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Filter directives for the given flag and environment value.
pub fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return level_name(lvl).to_string();
    }

    match env_value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("warning") => "warn".to_string(),
        Some(v) if !v.is_empty() => v.to_lowercase(),
        _ => "info".to_string(),
    }
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
