// src/config/validate.rs

use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{InkwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::InkwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_project(&raw)?;
        validate_compile(&raw)?;

        let timeout = parse_duration(&raw.compile.timeout)
            .map_err(|e| config_error(format!("[compile].timeout: {e}")))?;
        let poll_interval = parse_duration(&raw.compile.poll_interval)
            .map_err(|e| config_error(format!("[compile].poll_interval: {e}")))?;
        if timeout.is_zero() {
            return Err(config_error("[compile].timeout must be greater than zero"));
        }
        if poll_interval.is_zero() {
            return Err(config_error("[compile].poll_interval must be greater than zero"));
        }

        let exclude = build_globset(&raw.project.exclude, "[project].exclude")?;
        let manual_only = build_globset(&raw.compile.manual_only, "[compile].manual_only")?;

        Ok(ConfigFile::new_unchecked(
            raw.project,
            raw.compile,
            timeout,
            poll_interval,
            exclude,
            manual_only,
        ))
    }
}

fn config_error(msg: impl Into<String>) -> InkwatchError {
    InkwatchError::ConfigError(msg.into())
}

fn validate_project(cfg: &RawConfigFile) -> Result<()> {
    let ext = cfg.project.extension.trim();
    if ext.is_empty() {
        return Err(config_error("[project].extension must not be empty"));
    }
    if ext.starts_with('.') {
        return Err(config_error(format!(
            "[project].extension must not start with a dot (got \"{ext}\")"
        )));
    }
    if cfg.project.state_dir.as_os_str().is_empty() {
        return Err(config_error("[project].state_dir must not be empty"));
    }
    Ok(())
}

fn validate_compile(cfg: &RawConfigFile) -> Result<()> {
    if cfg.compile.command.trim().is_empty() {
        return Err(config_error("[compile].command must not be empty"));
    }
    let fraction = cfg.compile.slow_warning_fraction;
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(config_error(format!(
            "[compile].slow_warning_fraction must be in (0, 1] (got {fraction})"
        )));
    }
    Ok(())
}

fn build_globset(patterns: &[String], what: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| config_error(format!("{what}: invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| config_error(format!("{what}: {e}")))?;
    Ok(Some(set))
}

/// Parse a simple duration string like `"250ms"`, `"30s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}
