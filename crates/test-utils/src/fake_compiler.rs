use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use inkwatch::compiler::{CompileRequest, Compiler};
use inkwatch::graph::includes::dir_of;
use inkwatch::graph::{extract_includes, resolve_include};

/// What the fake compiler does for one master.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit `lines`, then return `artifact`.
    Succeed { lines: Vec<String>, artifact: Vec<u8> },
    /// Emit `lines` and produce no output (the source has errors).
    Reject { lines: Vec<String> },
    /// Return an error (an unhandled compiler failure).
    Fail(String),
    /// Panic inside the compiler.
    Panic(String),
    /// Emit `lines`, then block until cancelled or released.
    Hang { lines: Vec<String> },
    /// Like `Hang`, but deaf to cancellation: only `release_all` ends it.
    Stubborn { lines: Vec<String> },
}

#[derive(Debug, Default)]
struct Shared {
    scripts: Mutex<HashMap<PathBuf, Script>>,
    calls: Mutex<Vec<PathBuf>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    released: AtomicBool,
}

/// A `Compiler` that:
/// - records which masters it compiled, in order
/// - tracks how many compiles ever ran at the same time
/// - follows a per-master [`Script`]; unscripted masters compile by reading
///   every include (transitively) through the request's resolver and return
///   the master text with the included texts appended, or an `ERROR:` line
///   if an include can't be read.
///
/// Clones share state, so a test can keep one while the orchestrator owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompiler {
    shared: Arc<Shared>,
}

impl ScriptedCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, master: impl AsRef<Path>, script: Script) -> &Self {
        self.shared
            .scripts
            .lock()
            .unwrap()
            .insert(master.as_ref().to_path_buf(), script);
        self
    }

    /// Masters compiled so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Highest number of compiles that were ever running at once.
    pub fn max_concurrent(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }

    /// Let every hanging compile return.
    pub fn release_all(&self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }

    fn run_default(request: &CompileRequest, on_line: &mut dyn FnMut(&str)) -> Result<Option<Vec<u8>>> {
        let mut failed = false;
        let mut out = request.source.clone();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut stack = vec![(request.master.clone(), request.source.clone())];

        while let Some((from, text)) = stack.pop() {
            for raw in extract_includes(&text) {
                let Some(target) = resolve_include(dir_of(&from), &raw) else {
                    on_line(&format!("ERROR: '{}' line 1: include '{raw}' is outside the project", from.display()));
                    failed = true;
                    continue;
                };
                if !seen.insert(target.clone()) {
                    continue;
                }
                match request.includes.read(&from, &raw) {
                    Ok(body) => {
                        out.push('\n');
                        out.push_str(&body);
                        stack.push((target, body));
                    }
                    Err(err) => {
                        on_line(&format!("ERROR: '{}' line 1: {err}", from.display()));
                        failed = true;
                    }
                }
            }
        }

        if failed {
            return Ok(None);
        }
        Ok(Some(out.into_bytes()))
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Compiler for ScriptedCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<Vec<u8>>> {
        let now_active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.shared.active);
        self.shared.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.shared.calls.lock().unwrap().push(request.master.clone());

        let script = self.shared.scripts.lock().unwrap().get(&request.master).cloned();
        match script {
            None => Self::run_default(request, on_line),
            Some(Script::Succeed { lines, artifact }) => {
                lines.iter().for_each(|l| on_line(l.as_str()));
                Ok(Some(artifact))
            }
            Some(Script::Reject { lines }) => {
                lines.iter().for_each(|l| on_line(l.as_str()));
                Ok(None)
            }
            Some(Script::Fail(message)) => bail!(message),
            Some(Script::Panic(message)) => panic!("{message}"),
            Some(Script::Hang { lines }) => {
                lines.iter().for_each(|l| on_line(l.as_str()));
                loop {
                    if request.cancel.is_cancelled() {
                        bail!("cancelled");
                    }
                    if self.shared.released.load(Ordering::SeqCst) {
                        return Ok(Some(b"{}".to_vec()));
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Some(Script::Stubborn { lines }) => {
                lines.iter().for_each(|l| on_line(l.as_str()));
                while !self.shared.released.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(Some(b"{}".to_vec()))
            }
        }
    }
}
