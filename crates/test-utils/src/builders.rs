#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use inkwatch::config::{ConfigFile, RawConfigFile};
use inkwatch::engine::{BatchSummary, CompileOrchestrator, OrchestratorOptions};
use inkwatch::fs::mock::MockFileSystem;
use inkwatch::graph::{FileGraph, GraphOptions};

use crate::fake_compiler::ScriptedCompiler;
use crate::recording_host::RecordingHost;

pub const ROOT: &str = "/proj";

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.config.project.extension = ext.to_string();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.project.exclude.push(pattern.to_string());
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.project.output_dir = Some(PathBuf::from(dir));
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.compile.timeout = timeout.to_string();
        self
    }

    pub fn manual_only(mut self, pattern: &str) -> Self {
        self.config.compile.manual_only.push(pattern.to_string());
        self
    }

    pub fn compile_on_change(mut self, val: bool) -> Self {
        self.config.compile.compile_on_change = val;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory project plus an orchestrator wired to fakes.
pub struct TestProject {
    pub fs: MockFileSystem,
    pub compiler: ScriptedCompiler,
    pub host: RecordingHost,
    pub orchestrator: CompileOrchestrator,
}

impl TestProject {
    pub fn path(rel: &str) -> PathBuf {
        Path::new(ROOT).join(rel)
    }

    /// Write (or overwrite) a source file and report the change.
    pub fn edit(&mut self, rel: &str, content: &str) -> Vec<PathBuf> {
        self.fs.add_file(Self::path(rel), content);
        self.orchestrator.on_source_changed(Path::new(rel))
    }

    /// Poll until the batch drains (or `limit` passes). Returns the summary.
    pub fn run_until_drained(&mut self, limit: Duration) -> Option<BatchSummary> {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if let Some(summary) = self.orchestrator.poll().completed {
                return Some(summary);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    pub fn artifact(&self, rel: &str) -> Option<String> {
        self.fs
            .contents(Self::path(rel))
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

/// Builder for [`TestProject`].
pub struct TestProjectBuilder {
    files: Vec<(String, String)>,
    graph_options: GraphOptions,
    options: OrchestratorOptions,
    compiler: ScriptedCompiler,
}

impl TestProjectBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            graph_options: GraphOptions::new("ink"),
            options: OrchestratorOptions {
                state_path: Some(TestProject::path(".inkwatch/queue.json")),
                ..OrchestratorOptions::default()
            },
            compiler: ScriptedCompiler::new(),
        }
    }

    pub fn file(mut self, rel: &str, content: &str) -> Self {
        self.files.push((rel.to_string(), content.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn options(mut self, f: impl FnOnce(&mut OrchestratorOptions)) -> Self {
        f(&mut self.options);
        self
    }

    pub fn graph_options(mut self, f: impl FnOnce(&mut GraphOptions)) -> Self {
        f(&mut self.graph_options);
        self
    }

    pub fn compiler(mut self, compiler: ScriptedCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Build on top of an existing filesystem (e.g. to simulate a restart).
    pub fn build_on(self, fs: MockFileSystem) -> TestProject {
        for (rel, content) in &self.files {
            fs.add_file(TestProject::path(rel), content.as_str());
        }
        let graph = FileGraph::build(ROOT, self.graph_options, &fs)
            .expect("building file graph from mock filesystem");
        let host = RecordingHost::new();
        let orchestrator = CompileOrchestrator::new(
            graph,
            Arc::new(fs.clone()),
            Arc::new(self.compiler.clone()),
            Box::new(host.clone()),
            self.options,
        );
        TestProject {
            fs,
            compiler: self.compiler,
            host,
            orchestrator,
        }
    }

    pub fn build(self) -> TestProject {
        self.build_on(MockFileSystem::new())
    }
}

impl Default for TestProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}
