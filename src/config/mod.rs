// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`]: the TOML data model and the validated [`ConfigFile`].
//! - [`loader`]: reading a config file from disk.
//! - [`validate`]: `RawConfigFile -> ConfigFile` checks, durations and globs.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{CompileSection, ConfigFile, ProjectSection, RawConfigFile};
pub use validate::parse_duration;
