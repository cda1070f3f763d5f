// src/compiler/process.rs

//! Compiler backend that runs an external compiler program.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{CompileRequest, Compiler};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Runs `program args...` once per job.
///
/// `{input}` in an argument is replaced with the absolute master path and
/// `{output}` with a scratch file under `scratch_dir`; the scratch file is
/// read back as the artifact and removed. The orchestrator writes the real
/// artifact itself.
///
/// The child is driven on a small current-thread tokio runtime owned by the
/// compile call, so it works from the worker pool and from a plain thread.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
}

/// How the child process ended.
enum Exit {
    Status(ExitStatus),
    Cancelled,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch_dir: scratch_dir.into(),
        }
    }

    fn expand_args(&self, request: &CompileRequest, scratch: &Path) -> Vec<String> {
        let input = request.input_path.to_string_lossy();
        let output = scratch.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    /// Spawn the compiler, relay its stdout and stderr line by line, and wait
    /// for it to exit or for the job to be cancelled.
    async fn run_child(
        &self,
        request: &CompileRequest,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(Exit, bool)> {
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(request.input_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning compiler '{}'", self.program))?;

        let stdout = child.stdout.take().context("compiler stdout was not captured")?;
        let stderr = child.stderr.take().context("compiler stderr was not captured")?;
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        let mut saw_error = false;
        let mut relay = |line: String| {
            if line.trim_start().starts_with("ERROR") {
                saw_error = true;
            }
            on_line(&line);
        };

        let exit = loop {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => relay(line),
                    _ => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => relay(line),
                    _ => stderr_open = false,
                },
                // Only once both pipes are drained, so no output is lost.
                status = child.wait(), if !stdout_open && !stderr_open => {
                    let status = status
                        .with_context(|| format!("waiting for compiler '{}'", self.program))?;
                    break Exit::Status(status);
                }
                _ = request.cancel.cancelled() => {
                    info!(job = request.job_id.0, "compile cancelled; killing compiler process");
                    if let Err(e) = child.kill().await {
                        warn!(job = request.job_id.0, error = %e, "failed to kill compiler process");
                    }
                    break Exit::Cancelled;
                }
            }
        };

        Ok((exit, saw_error))
    }
}

impl Compiler for CommandCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<Vec<u8>>> {
        fs::create_dir_all(&self.scratch_dir)
            .with_context(|| format!("creating scratch dir {:?}", self.scratch_dir))?;
        let scratch = self.scratch_dir.join(format!("job-{}.json", request.job_id.0));
        let args = self.expand_args(request, &scratch);

        info!(
            job = request.job_id.0,
            file = %request.master.display(),
            program = %self.program,
            "starting compiler process"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building compiler process runtime")?;
        let result = runtime.block_on(self.run_child(request, &args, on_line));

        let (exit, saw_error) = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = fs::remove_file(&scratch);
                return Err(err);
            }
        };

        let status = match exit {
            Exit::Status(status) => status,
            Exit::Cancelled => {
                let _ = fs::remove_file(&scratch);
                bail!("compile of {} was cancelled", request.master.display());
            }
        };

        debug!(
            job = request.job_id.0,
            exit_code = status.code().unwrap_or(-1),
            "compiler process exited"
        );

        if status.success() {
            let bytes = fs::read(&scratch)
                .with_context(|| format!("reading compiler output {:?}", scratch))?;
            let _ = fs::remove_file(&scratch);
            return Ok(Some(bytes));
        }

        let _ = fs::remove_file(&scratch);
        if saw_error {
            Ok(None)
        } else {
            bail!(
                "compiler '{}' exited with {} without reporting an error",
                self.program,
                status
            )
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compiler::{CancelToken, IncludeResolver};
    use crate::engine::job::JobId;
    use crate::fs::RealFileSystem;
    use crate::graph::IncludeMap;
    use std::sync::Arc;

    fn request(dir: &std::path::Path) -> CompileRequest {
        let input = dir.join("main.ink");
        fs::write(&input, "Hello").unwrap();
        CompileRequest {
            job_id: JobId(1),
            master: PathBuf::from("main.ink"),
            input_path: input.clone(),
            output_path: dir.join("main.json"),
            source: "Hello".to_string(),
            includes: IncludeResolver::new(dir, IncludeMap::new(), Arc::new(RealFileSystem)),
            cancel: CancelToken::new(),
        }
    }

    fn sh(script: &str, dir: &std::path::Path) -> CommandCompiler {
        CommandCompiler::new(
            "sh",
            vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
            dir.join(".scratch"),
        )
    }

    #[test]
    fn successful_run_returns_scratch_output() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("echo 'WARNING: careful'; printf '{\"ok\":1}' > \"$2\"", dir.path());
        let mut lines = Vec::new();
        let out = compiler
            .compile(&request(dir.path()), &mut |l| lines.push(l.to_string()))
            .unwrap();
        assert_eq!(out, Some(b"{\"ok\":1}".to_vec()));
        assert_eq!(lines, vec!["WARNING: careful"]);
    }

    #[test]
    fn failing_run_with_errors_is_not_unhandled() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("echo \"ERROR: 'main.ink' line 1: nope\"; exit 1", dir.path());
        let out = compiler.compile(&request(dir.path()), &mut |_| {}).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn failing_run_without_errors_is_unhandled() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("exit 3", dir.path());
        assert!(compiler.compile(&request(dir.path()), &mut |_| {}).is_err());
    }

    #[test]
    fn cancelled_run_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("sleep 30", dir.path());
        let req = request(dir.path());
        req.cancel.cancel();
        let err = compiler.compile(&req, &mut |_| {}).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn cancelling_a_running_compile_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("echo started; sleep 30", dir.path());
        let req = request(dir.path());
        let cancel = req.cancel.clone();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(200));
            cancel.cancel();
        });
        let started = std::time::Instant::now();
        let mut lines = Vec::new();
        let err = compiler
            .compile(&req, &mut |l| lines.push(l.to_string()))
            .unwrap_err();
        canceller.join().unwrap();

        assert!(err.to_string().contains("cancelled"));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert_eq!(lines, vec!["started"]);
    }

    #[test]
    fn stderr_lines_are_relayed_too() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = sh("echo \"ERROR: 'main.ink' line 2: bad\" >&2; exit 1", dir.path());
        let mut lines = Vec::new();
        let out = compiler
            .compile(&request(dir.path()), &mut |l| lines.push(l.to_string()))
            .unwrap();
        assert_eq!(out, None);
        assert_eq!(lines, vec!["ERROR: 'main.ink' line 2: bad"]);
    }
}
