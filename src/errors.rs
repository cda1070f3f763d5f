// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InkwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Queue state error: {0}")]
    StateError(String),

    #[error("Unknown source file: {0:?}")]
    UnknownFile(PathBuf),

    #[error("Not a master file: {0:?}")]
    NotAMaster(PathBuf),

    #[error("Master file already has an active compile job: {0:?}")]
    AlreadyQueued(PathBuf),

    #[error("Compilation in progress; wait for the batch to finish or cancel it first")]
    CompileInProgress,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, InkwatchError>;
