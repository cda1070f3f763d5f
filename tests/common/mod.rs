#![allow(dead_code)]

pub use inkwatch_test_utils::builders;
pub use inkwatch_test_utils::{
    init_tracing, with_timeout, ConfigFileBuilder, HostEvent, RecordingHost, Script,
    ScriptedCompiler, TestProject, TestProjectBuilder, ROOT,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Generous upper bound for a batch of fake compiles to drain.
pub const DRAIN_LIMIT: Duration = Duration::from_secs(5);

pub fn p(rel: &str) -> PathBuf {
    PathBuf::from(rel)
}

pub fn ps(rels: &[&str]) -> Vec<PathBuf> {
    rels.iter().map(|r| PathBuf::from(r)).collect()
}

pub fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|l| l.to_string()).collect()
}

/// A small project: two masters sharing one include.
///
/// ```text
/// main.ink ──> shared/vars.ink <── side.ink
///    └──────> chapters/one.ink
/// ```
pub fn story_project() -> TestProjectBuilder {
    TestProjectBuilder::new()
        .file("main.ink", "INCLUDE chapters/one.ink\nINCLUDE shared/vars.ink\nHello.\n")
        .file("chapters/one.ink", "=== one ===\nOnce upon a time.\n")
        .file("shared/vars.ink", "VAR gold = 0\n")
        .file("side.ink", "INCLUDE shared/vars.ink\nA side story.\n")
}

pub fn masters_of(project: &TestProject, rel: &str) -> Vec<PathBuf> {
    project
        .orchestrator
        .graph()
        .file(Path::new(rel))
        .map(|f| f.masters.iter().cloned().collect())
        .unwrap_or_default()
}
