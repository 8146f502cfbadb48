// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagerunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Misuse of a [`Sequence`](crate::engine::Sequence).
///
/// These are programming errors on the caller's side and are never
/// reported to the watcher.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("a stage sequence needs at least one stage")]
    Empty,

    #[error("stage sequence was already started")]
    AlreadyStarted,

    #[error("no tokio runtime available to run stage workers")]
    NoRuntime,
}

/// The owning loop stopped before a bridge request could be delivered or
/// acknowledged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("owning loop is no longer running")]
pub struct BridgeClosed;

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagerunError>;
