// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::GlobSet;
use serde::Deserialize;

use crate::engine::orchestrator::OrchestratorOptions;
use crate::engine::state::STATE_FILE;
use crate::graph::GraphOptions;

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [project]
/// root = "story"
/// exclude = ["**/drafts/**"]
///
/// [compile]
/// command = "inklecate"
/// args = ["-o", "{output}", "{input}"]
/// timeout = "30s"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub compile: CompileSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Project root, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Source file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Glob patterns (relative to the root) for files that are never tracked.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Where artifacts go, relative to the root. Unset puts each artifact
    /// next to its master file.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Directory (relative to the root) for the persisted queue and compiler
    /// scratch files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    "ink".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".inkwatch")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            extension: default_extension(),
            exclude: Vec::new(),
            output_dir: None,
            state_dir: default_state_dir(),
        }
    }
}

/// `[compile]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileSection {
    /// External compiler program.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments; `{input}` and `{output}` are substituted per job.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// e.g. `"30s"`, `"2m"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default = "default_slow_warning_fraction")]
    pub slow_warning_fraction: f64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_true")]
    pub compile_on_change: bool,

    /// Masters matching these globs compile only when asked explicitly.
    #[serde(default)]
    pub manual_only: Vec<String>,

    #[serde(default = "default_true")]
    pub compile_on_startup: bool,

    #[serde(default = "default_true")]
    pub log_diagnostics: bool,
}

fn default_command() -> String {
    "inklecate".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-o".into(), "{output}".into(), "{input}".into()]
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_slow_warning_fraction() -> f64 {
    0.8
}

fn default_poll_interval() -> String {
    "100ms".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CompileSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            timeout: default_timeout(),
            slow_warning_fraction: default_slow_warning_fraction(),
            poll_interval: default_poll_interval(),
            compile_on_change: true,
            manual_only: Vec::new(),
            compile_on_startup: true,
            log_diagnostics: true,
        }
    }
}

/// Validated configuration. Build one with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub compile: CompileSection,
    timeout: Duration,
    poll_interval: Duration,
    exclude: Option<GlobSet>,
    manual_only: Option<GlobSet>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        project: ProjectSection,
        compile: CompileSection,
        timeout: Duration,
        poll_interval: Duration,
        exclude: Option<GlobSet>,
        manual_only: Option<GlobSet>,
    ) -> Self {
        Self {
            project,
            compile,
            timeout,
            poll_interval,
            exclude,
            manual_only,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Absolute-ish project root for a config file living in `config_dir`.
    pub fn root_dir(&self, config_dir: &Path) -> PathBuf {
        if self.project.root.is_absolute() {
            self.project.root.clone()
        } else {
            config_dir.join(&self.project.root)
        }
    }

    pub fn state_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.project.state_dir)
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        self.state_dir(root).join(STATE_FILE)
    }

    pub fn scratch_dir(&self, root: &Path) -> PathBuf {
        self.state_dir(root).join("scratch")
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            extension: self.project.extension.clone(),
            exclude: self.exclude.clone(),
            output_dir: self.project.output_dir.clone(),
        }
    }

    pub fn orchestrator_options(&self, root: &Path) -> OrchestratorOptions {
        OrchestratorOptions {
            timeout: self.timeout,
            slow_warning_fraction: self.compile.slow_warning_fraction,
            state_path: Some(self.state_path(root)),
            log_diagnostics: self.compile.log_diagnostics,
            compile_on_change: self.compile.compile_on_change,
            manual_only: self.manual_only.clone(),
        }
    }
}
