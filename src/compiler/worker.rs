// src/compiler/worker.rs

//! Worker dispatch for compile jobs.
//!
//! A dispatched compile runs on tokio's blocking pool (or, outside a tokio
//! runtime, on its own named thread) and reports back through a single
//! oneshot slot. The orchestrator holds at most one [`InFlight`] at a time.
//! An abandoned worker is cancelled but not waited for, see
//! [`Compiler`](super::Compiler).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::{CancelToken, CompileRequest, Compiler};
use crate::engine::job::JobId;

/// Result of one compile, as produced on the worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerOutcome {
    pub artifact: Option<Vec<u8>>,
    pub output_lines: Vec<String>,
    pub unhandled_errors: Vec<String>,
}

/// Answer to [`InFlight::poll`].
#[derive(Debug)]
pub enum WorkerPoll {
    Pending,
    Finished(WorkerOutcome),
    /// The worker went away without reporting.
    Lost,
}

/// Handle to the single outstanding compile.
#[derive(Debug)]
pub struct InFlight {
    pub job_id: JobId,
    rx: oneshot::Receiver<WorkerOutcome>,
    cancel: CancelToken,
    output: Arc<Mutex<Vec<String>>>,
}

impl InFlight {
    pub fn poll(&mut self) -> WorkerPoll {
        match self.rx.try_recv() {
            Ok(outcome) => WorkerPoll::Finished(outcome),
            Err(oneshot::error::TryRecvError::Empty) => WorkerPoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => WorkerPoll::Lost,
        }
    }

    /// Output captured so far. Used to explain timeouts.
    pub fn partial_output(&self) -> Vec<String> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "compiler panicked".to_string()
    }
}

/// Run a compile on the current thread, capturing errors and panics.
///
/// Output lines are appended to `output` as they arrive.
pub fn run_compile(
    compiler: &dyn Compiler,
    request: &CompileRequest,
    output: &Mutex<Vec<String>>,
) -> WorkerOutcome {
    let mut on_line = |line: &str| {
        output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| compiler.compile(request, &mut on_line)));

    let (artifact, unhandled_errors) = match result {
        Ok(Ok(artifact)) => (artifact, Vec::new()),
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            error!(
                job = request.job_id.0,
                file = %request.master.display(),
                error = %message,
                "compiler failed"
            );
            (None, vec![message])
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                job = request.job_id.0,
                file = %request.master.display(),
                panic = %message,
                "compiler panicked"
            );
            (None, vec![format!("compiler panicked: {message}")])
        }
    };

    let output_lines = output
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    WorkerOutcome {
        artifact,
        output_lines,
        unhandled_errors,
    }
}

/// Start `request` on a worker.
///
/// Uses `spawn_blocking` when called from inside a tokio runtime (the
/// `inkwatch` binary), and a dedicated thread otherwise (synchronous callers
/// such as tests driving the orchestrator by hand).
pub fn dispatch(compiler: Arc<dyn Compiler>, request: CompileRequest) -> Result<InFlight> {
    let (tx, rx) = oneshot::channel();
    let output = Arc::new(Mutex::new(Vec::new()));
    let job_id = request.job_id;
    let cancel = request.cancel.clone();

    let worker_output = Arc::clone(&output);
    let work = move || {
        let outcome = run_compile(compiler.as_ref(), &request, &worker_output);
        if tx.send(outcome).is_err() {
            debug!(job = job_id.0, "compile result dropped; job was abandoned");
        }
    };

    match Handle::try_current() {
        Ok(handle) => {
            // The JoinHandle is not needed: the result comes back through `rx`.
            drop(handle.spawn_blocking(work));
        }
        Err(_) => {
            thread::Builder::new()
                .name(format!("inkwatch-compile-{}", job_id.0))
                .spawn(work)
                .context("spawning compile worker thread")?;
        }
    }

    Ok(InFlight {
        job_id,
        rx,
        cancel,
        output,
    })
}
