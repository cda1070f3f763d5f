// src/compiler/mod.rs

//! The external compiler seam.
//!
//! The orchestrator never compiles anything itself. It hands a
//! [`CompileRequest`] to a [`Compiler`] on a worker thread (see [`worker`])
//! and gets back artifact bytes or an error.
//!
//! - [`process::CommandCompiler`] runs an external compiler program and is
//!   what the `inkwatch` binary uses.
//! - Tests plug in their own `Compiler` that returns scripted results.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::watch;

use crate::engine::job::JobId;
use crate::fs::FileSystem;
use crate::graph::includes::{dir_of, resolve_include};
use crate::graph::IncludeMap;

pub mod process;
pub mod worker;

pub use process::CommandCompiler;
pub use worker::{dispatch, run_compile, InFlight, WorkerOutcome, WorkerPoll};

/// Cancellation signal shared between the orchestrator and a running compile.
///
/// Blocking compilers check [`is_cancelled`](Self::is_cancelled) between
/// units of work; async ones await [`cancelled`](Self::cancelled). Nothing
/// forces a compiler to stop: one that ignores the signal keeps running until
/// it returns on its own, and its result is then discarded by job id.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl Default for CancelToken {
    fn default() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in `self`, so the channel can't close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Resolves `INCLUDE` paths the same way the file graph does and reads the
/// included text.
///
/// Includes are looked up per including file: `INCLUDE common.ink` in
/// `a/x.ink` and in `b/x.ink` name two different files.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    root: PathBuf,
    known: IncludeMap,
    fs: Arc<dyn FileSystem>,
}

impl IncludeResolver {
    pub fn new(root: impl Into<PathBuf>, known: IncludeMap, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            known,
            fs,
        }
    }

    /// Absolute path for `raw` as written in `from` (relative to the project
    /// root). `None` if the include climbs out of the project.
    pub fn resolve(&self, from: &Path, raw: &str) -> Option<PathBuf> {
        let raw = raw.trim();
        if let Some(path) = self.known.get(&(from.to_path_buf(), raw.to_string())) {
            return Some(path.clone());
        }
        resolve_include(dir_of(from), raw).map(|rel| self.root.join(rel))
    }

    pub fn read(&self, from: &Path, raw: &str) -> Result<String> {
        let path = self
            .resolve(from, raw)
            .ok_or_else(|| anyhow!("include '{}' is outside the project", raw.trim()))?;
        self.fs
            .read_to_string(&path)
            .map_err(|e| anyhow!("cannot resolve include '{}': {e:#}", raw.trim()))
    }
}

/// Everything a compiler needs for one master file.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub job_id: JobId,
    /// Master, relative to the project root.
    pub master: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub source: String,
    pub includes: IncludeResolver,
    pub cancel: CancelToken,
}

impl CompileRequest {
    pub fn input_dir(&self) -> &Path {
        self.input_path.parent().unwrap_or(Path::new("."))
    }
}

/// Compile one master file to JSON bytes.
///
/// - Every raw output line (diagnostics included) goes to `on_line` as soon as
///   it is produced, so a timed out job can still report partial output.
/// - `Ok(Some(bytes))`: compiled.
/// - `Ok(None)`: the source has errors; the diagnostics explain why.
/// - `Err(_)`: the compiler itself failed. Treated as an unhandled error.
///
/// The orchestrator never starts a compile while another is in flight. A
/// timed out compile is only abandoned though: its `cancel` token fires and
/// the next job starts right away. An implementation that ignores the token
/// can therefore still be running when it is called for the next job.
pub trait Compiler: Send + Sync + Debug {
    fn compile(
        &self,
        request: &CompileRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<Vec<u8>>>;
}
