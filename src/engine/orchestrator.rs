// src/engine/orchestrator.rs

//! Compile job scheduler.
//!
//! `CompileOrchestrator` owns the file graph, the active job list and the
//! single outstanding worker. All state transitions happen on the thread that
//! calls into it (the polling thread); the worker only hands its result back
//! through the [`InFlight`] slot.
//!
//! Invariant: at most one job is `Compiling` at any time. It holds because a
//! job only starts from [`CompileOrchestrator::drain_queue`], which refuses
//! to start anything while another job is compiling.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use globset::GlobSet;
use tracing::{debug, error, info, warn};

use crate::compiler::{
    dispatch, run_compile, CancelToken, CompileRequest, Compiler, IncludeResolver, InFlight,
    WorkerOutcome, WorkerPoll,
};
use crate::diagnostics::{log_diagnostic, parse_lines, Severity};
use crate::engine::job::{CompileJob, JobId, JobState};
use crate::engine::pending::PendingList;
use crate::engine::state::{epoch_millis, PersistedJob, PersistedQueueState};
use crate::engine::summary::BatchSummary;
use crate::errors::{InkwatchError, Result};
use crate::fs::FileSystem;
use crate::graph::FileGraph;
use crate::host::Host;
use crate::types::{HostMode, ModeTransition};

const IMMEDIATE_WAIT_STEP: Duration = Duration::from_millis(5);

/// Knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// A compile running longer than this is abandoned.
    pub timeout: Duration,
    /// Compiles slower than `timeout * slow_warning_fraction` log a warning.
    pub slow_warning_fraction: f64,
    /// Absolute path of the persisted queue snapshot. `None` disables it.
    pub state_path: Option<PathBuf>,
    pub log_diagnostics: bool,
    /// Compile masters automatically when their family changes.
    pub compile_on_change: bool,
    /// Masters that are only compiled on explicit request.
    pub manual_only: Option<GlobSet>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            slow_warning_fraction: 0.8,
            state_path: None,
            log_diagnostics: true,
            compile_on_change: true,
            manual_only: None,
        }
    }
}

/// What a single polling tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStep {
    /// Jobs that moved to `Compiling` during this tick.
    pub started: Vec<JobId>,
    /// Masters whose compile was abandoned on timeout.
    pub timed_out: Vec<PathBuf>,
    /// Set when the batch drained during this tick.
    pub completed: Option<BatchSummary>,
}

#[derive(Debug)]
pub struct CompileOrchestrator {
    graph: FileGraph,
    fs: Arc<dyn FileSystem>,
    compiler: Arc<dyn Compiler>,
    host: Box<dyn Host>,
    options: OrchestratorOptions,
    /// Active list, in enqueue order.
    jobs: Vec<CompileJob>,
    /// Timed out jobs, removed from the active list but not yet reported.
    abandoned: Vec<CompileJob>,
    in_flight: Option<InFlight>,
    pending: PendingList,
    next_job_id: u64,
    mode: HostMode,
    deferred_restricted_entry: bool,
    rebuild_suspended: bool,
}

impl CompileOrchestrator {
    pub fn new(
        graph: FileGraph,
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn Compiler>,
        host: Box<dyn Host>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            graph,
            fs,
            compiler,
            host,
            options,
            jobs: Vec::new(),
            abandoned: Vec::new(),
            in_flight: None,
            pending: PendingList::new(),
            next_job_id: 1,
            mode: HostMode::Editing,
            deferred_restricted_entry: false,
            rebuild_suspended: false,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn graph(&self) -> &FileGraph {
        &self.graph
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Active jobs, in enqueue order.
    pub fn jobs(&self) -> &[CompileJob] {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> Option<&CompileJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Jobs abandoned on timeout since the last drained batch.
    pub fn abandoned(&self) -> &[CompileJob] {
        &self.abandoned
    }

    pub fn pending(&self) -> &PendingList {
        &self.pending
    }

    pub fn mode(&self) -> HostMode {
        self.mode
    }

    /// Whether a restricted-mode entry is waiting for the batch to drain.
    pub fn has_deferred_mode_entry(&self) -> bool {
        self.deferred_restricted_entry
    }

    /// A batch is outstanding: something is queued, compiling, or finished
    /// but not yet applied.
    pub fn is_busy(&self) -> bool {
        !self.jobs.is_empty() || !self.abandoned.is_empty()
    }

    pub fn is_compiling(&self) -> bool {
        self.jobs.iter().any(CompileJob::is_compiling)
    }

    pub fn has_active_job(&self, master: &Path) -> bool {
        self.jobs.iter().any(|j| j.path == master)
    }

    /// Coarse batch progress in `[0, 1]`.
    ///
    /// Compiling jobs count as `elapsed / timeout`, complete jobs as 1 and
    /// queued jobs as 0, averaged over the active list. An idle orchestrator
    /// reports 0.
    pub fn estimated_progress(&self, now: Instant) -> f32 {
        if self.jobs.is_empty() {
            return 0.0;
        }
        let timeout = self.options.timeout.as_secs_f64().max(f64::EPSILON);
        let total: f64 = self
            .jobs
            .iter()
            .map(|job| match job.state {
                JobState::Queued => 0.0,
                JobState::Compiling => (job.elapsed(now).as_secs_f64() / timeout).min(1.0),
                JobState::Complete => 1.0,
            })
            .sum();
        (total / self.jobs.len() as f64) as f32
    }

    fn is_manual_only(&self, master: &Path) -> bool {
        self.options
            .manual_only
            .as_ref()
            .is_some_and(|set| set.is_match(master.to_string_lossy().replace('\\', "/")))
    }

    // ------------------------------------------------------------------
    // Enqueue / drain
    // ------------------------------------------------------------------

    /// Queue a compile of `master`.
    ///
    /// Rejected with [`InkwatchError::AlreadyQueued`] if `master` already has
    /// an active job. With `immediate`, the call returns only once the job has
    /// completed (and its batch drained, if nothing else was queued).
    pub fn enqueue(&mut self, master: &Path, immediate: bool) -> Result<JobId> {
        self.enqueue_at(master, immediate, Instant::now())
    }

    pub fn enqueue_at(&mut self, master: &Path, immediate: bool, now: Instant) -> Result<JobId> {
        let file = self
            .graph
            .file(master)
            .ok_or_else(|| InkwatchError::UnknownFile(master.to_path_buf()))?;
        if !file.is_master() {
            return Err(InkwatchError::NotAMaster(master.to_path_buf()));
        }
        if self.has_active_job(master) {
            warn!(file = %master.display(), "master already has an active compile job; rejecting");
            return Err(InkwatchError::AlreadyQueued(master.to_path_buf()));
        }

        let id = JobId(self.next_job_id);
        self.next_job_id += 1;

        let input = self.graph.absolute(master);
        let output = self.graph.absolute(&self.graph.artifact_path(master));
        let job = CompileJob::new(id, master.to_path_buf(), input, output, immediate);

        if !self.is_busy() && !self.rebuild_suspended {
            self.host.suspend_competing_rebuild();
            self.rebuild_suspended = true;
        }

        info!(job = id.0, file = %master.display(), immediate, "compile job queued");
        self.jobs.push(job);
        self.pending.remove(master);
        self.persist();

        self.drain_queue(now);

        if immediate {
            self.wait_for(id);
        }

        Ok(id)
    }

    /// Block until job `id` is complete or gone. Jobs ahead of it keep being
    /// polled (including timeouts) while waiting.
    fn wait_for(&mut self, id: JobId) {
        loop {
            let done = self.job(id).is_none_or(CompileJob::is_complete);
            if done {
                break;
            }
            self.poll();
            if self.job(id).is_some_and(|j| !j.is_complete()) {
                thread::sleep(IMMEDIATE_WAIT_STEP);
            }
        }
        // Drain right away if nothing else is waiting.
        self.poll();
    }

    /// Start the oldest queued job, unless one is already compiling.
    ///
    /// Immediate jobs compile synchronously here; draining then moves on to
    /// the next queued job. Returns the jobs that were started.
    pub fn drain_queue(&mut self, now: Instant) -> Vec<JobId> {
        let mut started = Vec::new();

        loop {
            if self.is_compiling() || self.in_flight.is_some() {
                break;
            }
            let Some(idx) = self.jobs.iter().position(CompileJob::is_queued) else {
                break;
            };

            let id = self.jobs[idx].id;
            let immediate = self.jobs[idx].immediate;
            let request = self.build_request(&self.jobs[idx]);
            self.jobs[idx].start(now);
            started.push(id);
            debug!(job = id.0, file = %self.jobs[idx].path.display(), "job compiling");

            let request = match request {
                Ok(request) => request,
                Err(err) => {
                    let outcome = WorkerOutcome {
                        unhandled_errors: vec![format!("{err:#}")],
                        ..WorkerOutcome::default()
                    };
                    self.on_worker_finished(id, outcome, now);
                    continue;
                }
            };

            if immediate {
                let output = Mutex::new(Vec::new());
                let outcome = run_compile(self.compiler.as_ref(), &request, &output);
                self.on_worker_finished(id, outcome, Instant::now());
                continue;
            }

            match dispatch(Arc::clone(&self.compiler), request) {
                Ok(in_flight) => {
                    self.in_flight = Some(in_flight);
                    self.persist();
                }
                Err(err) => {
                    let outcome = WorkerOutcome {
                        unhandled_errors: vec![format!("{err:#}")],
                        ..WorkerOutcome::default()
                    };
                    self.on_worker_finished(id, outcome, now);
                }
            }
        }

        started
    }

    fn build_request(&self, job: &CompileJob) -> anyhow::Result<CompileRequest> {
        let source = self.fs.read_to_string(&job.input_path)?;
        Ok(CompileRequest {
            job_id: job.id,
            master: job.path.clone(),
            input_path: job.input_path.clone(),
            output_path: job.output_path.clone(),
            source,
            includes: IncludeResolver::new(
                self.graph.root(),
                self.graph.include_map(&job.path),
                Arc::clone(&self.fs),
            ),
            cancel: CancelToken::new(),
        })
    }

    /// Record the result of a compile. Results for jobs that are no longer
    /// compiling (abandoned, cancelled) are ignored.
    pub fn on_worker_finished(&mut self, id: JobId, outcome: WorkerOutcome, now: Instant) {
        let Some(job) = self
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.is_compiling())
        else {
            debug!(job = id.0, "ignoring result of a job that is no longer compiling");
            return;
        };

        job.complete(now);
        job.output_lines = outcome.output_lines;
        job.unhandled_errors = outcome.unhandled_errors;
        job.artifact = outcome.artifact;

        let elapsed = job.duration().unwrap_or_default();
        let slow_after = self
            .options
            .timeout
            .mul_f64(self.options.slow_warning_fraction.clamp(0.0, 1.0));
        if elapsed > slow_after {
            warn!(
                job = id.0,
                file = %job.path.display(),
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.options.timeout.as_millis() as u64,
                "compile is close to the timeout"
            );
        }
        info!(
            job = id.0,
            file = %job.path.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            produced_artifact = job.artifact.is_some(),
            "job complete"
        );

        self.persist();
    }

    // ------------------------------------------------------------------
    // Polling tick
    // ------------------------------------------------------------------

    pub fn poll(&mut self) -> PollStep {
        self.poll_at(Instant::now())
    }

    /// One polling tick at time `now`.
    pub fn poll_at(&mut self, now: Instant) -> PollStep {
        let mut step = PollStep::default();

        self.collect_worker(now);

        if let Some(idx) = self.jobs.iter().position(CompileJob::is_compiling) {
            if self.jobs[idx].elapsed(now) > self.options.timeout {
                step.timed_out.push(self.jobs[idx].path.clone());
                step.started.extend(self.abandon(idx, now));
            }
        }

        let compiling = self.is_compiling();
        let queued = self.jobs.iter().any(CompileJob::is_queued);
        if !compiling && queued {
            step.started.extend(self.drain_queue(now));
        }

        if !self.is_compiling() && !self.jobs.iter().any(CompileJob::is_queued) && self.is_busy() {
            step.completed = Some(self.on_queue_drained(now));
        }

        step
    }

    fn collect_worker(&mut self, now: Instant) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return;
        };
        let id = in_flight.job_id;
        let outcome = match in_flight.poll() {
            WorkerPoll::Pending => return,
            WorkerPoll::Finished(outcome) => outcome,
            WorkerPoll::Lost => {
                error!(job = id.0, "compile worker exited without reporting a result");
                WorkerOutcome {
                    output_lines: in_flight.partial_output(),
                    unhandled_errors: vec!["compile worker exited without reporting a result".into()],
                    artifact: None,
                }
            }
        };
        self.in_flight = None;
        self.on_worker_finished(id, outcome, now);
    }

    /// Give up on the compiling job at `idx`: cancel its worker, record a
    /// timeout error with whatever output it produced, and start the next job.
    fn abandon(&mut self, idx: usize, now: Instant) -> Vec<JobId> {
        let mut job = self.jobs.remove(idx);

        let partial = match self.in_flight.take() {
            Some(in_flight) if in_flight.job_id == job.id => {
                in_flight.cancel();
                in_flight.partial_output()
            }
            other => {
                self.in_flight = other;
                Vec::new()
            }
        };

        let mut message = format!(
            "compile of {} timed out after {:.1}s",
            job.path.display(),
            self.options.timeout.as_secs_f64()
        );
        if partial.is_empty() {
            message.push_str("; no output was captured");
        } else {
            message.push_str("; partial output:\n");
            message.push_str(&partial.join("\n"));
        }

        error!(
            job = job.id.0,
            file = %job.path.display(),
            timeout_ms = self.options.timeout.as_millis() as u64,
            "compile timed out; abandoning job"
        );

        job.complete(now);
        job.output_lines = partial;
        job.unhandled_errors.push(message);
        job.artifact = None;
        self.abandoned.push(job);
        self.persist();

        self.drain_queue(now)
    }

    /// Apply every finished job of the batch in enqueue order, then report.
    pub fn on_queue_drained(&mut self, now: Instant) -> BatchSummary {
        let mut finished: Vec<CompileJob> = self.jobs.drain(..).chain(self.abandoned.drain(..)).collect();
        finished.sort_by_key(|j| j.id);

        let mut summary = BatchSummary::default();
        let compiled_at = SystemTime::now();

        for job in &finished {
            let mut unhandled = job.unhandled_errors.clone();
            let mut artifact = None;

            if let Some(bytes) = &job.artifact {
                match self.fs.write_atomic(&job.output_path, bytes) {
                    Ok(()) => artifact = Some(self.graph.artifact_path(&job.path)),
                    Err(err) => {
                        error!(file = %job.output_path.display(), error = %err, "failed to write artifact");
                        unhandled.push(format!("failed to write artifact: {err:#}"));
                    }
                }
            }

            let diagnostics = parse_lines(&job.output_lines);
            if self.options.log_diagnostics {
                let master = job.path.to_string_lossy();
                for diagnostic in &diagnostics {
                    log_diagnostic(&master, diagnostic);
                }
            }

            for diagnostic in &diagnostics {
                match diagnostic.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Author => summary.todos += 1,
                }
            }
            summary.unhandled += unhandled.len();

            if artifact.is_none() {
                summary.failed.push(job.path.clone());
            }
            summary.compiled.push(job.path.clone());

            self.graph
                .apply_compile_result(&job.path, &diagnostics, &unhandled, artifact, compiled_at);
        }

        summary.has_errors = finished
            .iter()
            .any(|j| self.graph.family_has_errors(&j.path));

        info!(
            compiled = summary.compiled.len(),
            failed = summary.failed.len(),
            errors = summary.errors,
            warnings = summary.warnings,
            has_errors = summary.has_errors,
            "batch drained"
        );

        self.persist();

        if self.rebuild_suspended {
            self.rebuild_suspended = false;
            self.host.release_competing_rebuild();
        }
        self.host.on_compilation_stack_completed(&summary);

        if self.deferred_restricted_entry {
            self.deferred_restricted_entry = false;
            if summary.has_errors {
                warn!("batch ended with errors; not entering restricted mode");
            } else {
                self.mode = HostMode::Restricted;
                self.host.enter_restricted_mode();
            }
        }

        if self.mode == HostMode::Editing && !self.pending.is_empty() {
            self.promote_pending(now);
        }

        summary
    }

    // ------------------------------------------------------------------
    // Host mode coordination
    // ------------------------------------------------------------------

    /// The host wants to enter restricted mode. Deferred while a batch is
    /// outstanding and replayed once it drains without errors.
    pub fn try_enter_restricted_mode(&mut self) -> ModeTransition {
        if self.is_busy() {
            if !self.deferred_restricted_entry {
                info!("batch in progress; deferring restricted mode");
            }
            self.deferred_restricted_entry = true;
            self.host.on_restricted_mode_deferred();
            return ModeTransition::Deferred;
        }
        self.mode = HostMode::Restricted;
        ModeTransition::Allowed
    }

    /// Back to editing: pending compiles become real jobs.
    pub fn exit_restricted_mode(&mut self, now: Instant) {
        if self.mode == HostMode::Editing {
            return;
        }
        self.mode = HostMode::Editing;
        info!(pending = self.pending.len(), "host returned to editing mode");
        self.promote_pending(now);
    }

    /// Host reports a mode change it has already made.
    pub fn set_mode(&mut self, mode: HostMode, now: Instant) {
        match mode {
            HostMode::Editing => self.exit_restricted_mode(now),
            HostMode::Restricted => self.mode = HostMode::Restricted,
        }
    }

    fn promote_pending(&mut self, now: Instant) {
        let paths = self.pending.drain();
        if paths.is_empty() {
            return;
        }
        debug!(count = paths.len(), "promoting pending compiles");
        for path in paths {
            if self.has_active_job(&path) {
                self.pending.push(path);
                continue;
            }
            if let Err(err) = self.enqueue_at(&path, false, now) {
                debug!(file = %path.display(), error = %err, "dropping pending compile");
            }
        }
        self.persist();
    }

    // ------------------------------------------------------------------
    // Entry points used by the runtime
    // ------------------------------------------------------------------

    /// A source file changed, appeared or disappeared.
    ///
    /// Updates the graph and queues (or parks) the affected masters.
    /// Returns the affected masters.
    pub fn on_source_changed(&mut self, path: &Path) -> Vec<PathBuf> {
        let masters = self.graph.refresh_file(self.fs.as_ref(), path);
        if !self.options.compile_on_change {
            return masters;
        }

        let mut parked = false;
        for master in &masters {
            if self.is_manual_only(master) {
                debug!(file = %master.display(), "manual-only master; not compiling on change");
                continue;
            }
            if self.mode == HostMode::Restricted || self.has_active_job(master) {
                parked |= self.pending.push(master.clone());
                continue;
            }
            if let Err(err) = self.enqueue(master, false) {
                warn!(file = %master.display(), error = %err, "could not queue compile");
            }
        }
        if parked {
            self.persist();
        }

        masters
    }

    /// Queue every stale master, or every master with `force`.
    ///
    /// Manual-only masters are included only with `force`.
    pub fn compile_all(&mut self, force: bool) -> Result<Vec<JobId>> {
        let targets: Vec<PathBuf> = if force {
            self.graph
                .master_files()
                .into_iter()
                .map(|f| f.path.clone())
                .collect()
        } else {
            self.graph
                .files_requiring_recompile(self.fs.as_ref())
                .into_iter()
                .filter(|m| !self.is_manual_only(m))
                .collect()
        };

        let mut ids = Vec::new();
        for master in targets {
            if self.has_active_job(&master) {
                continue;
            }
            if self.mode == HostMode::Restricted {
                if self.pending.push(master) {
                    self.persist();
                }
                continue;
            }
            ids.push(self.enqueue(&master, false)?);
        }
        Ok(ids)
    }

    /// Queue the masters owning `path`.
    ///
    /// In restricted mode nothing starts: the masters are parked on the
    /// pending list until the host returns to editing.
    pub fn compile_file(&mut self, path: &Path, immediate: bool) -> Result<Vec<JobId>> {
        let file = self
            .graph
            .file(path)
            .ok_or_else(|| InkwatchError::UnknownFile(path.to_path_buf()))?;
        let masters: Vec<PathBuf> = if file.is_master() {
            vec![path.to_path_buf()]
        } else {
            file.masters.iter().cloned().collect()
        };
        if masters.is_empty() {
            return Err(InkwatchError::NotAMaster(path.to_path_buf()));
        }

        if self.mode == HostMode::Restricted {
            let mut parked = false;
            for master in masters {
                parked |= self.pending.push(master);
            }
            if parked {
                info!(file = %path.display(), "restricted mode; compile request parked");
                self.persist();
            }
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for master in masters {
            match self.enqueue(&master, immediate) {
                Ok(id) => ids.push(id),
                Err(InkwatchError::AlreadyQueued(master)) => {
                    if self.pending.push(master) {
                        self.persist();
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(ids)
    }

    /// Drop every queued and compiling job. Finished jobs stay and are
    /// applied by the next tick. A deferred restricted-mode entry is
    /// dropped; the host has to ask again.
    pub fn cancel_all(&mut self) -> usize {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel();
        }

        let before = self.jobs.len();
        self.jobs.retain(CompileJob::is_complete);
        let cancelled = before - self.jobs.len();
        self.deferred_restricted_entry = false;

        if !self.is_busy() && self.rebuild_suspended {
            self.rebuild_suspended = false;
            self.host.release_competing_rebuild();
        }

        info!(cancelled, "cancelled active compile jobs");
        self.persist();
        cancelled
    }

    /// Stop the running compile (if any) on process shutdown.
    ///
    /// Unlike [`cancel_all`](Self::cancel_all) the persisted queue is left
    /// untouched, so the interrupted work is restored on the next start.
    pub fn shutdown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(job = in_flight.job_id.0, "cancelling in-flight compile on shutdown");
            in_flight.cancel();
        }
    }

    /// Full graph rebuild. Refused while a batch is outstanding.
    pub fn rebuild_graph(&mut self) -> Result<()> {
        if self.is_busy() {
            return Err(InkwatchError::CompileInProgress);
        }
        self.graph.rebuild(self.fs.as_ref())?;
        Ok(())
    }

    /// Rebuild the graph only if it is no longer consistent with the disk.
    pub fn rebuild_graph_if_required(&mut self) -> Result<bool> {
        if !self.graph.requires_rebuild(self.fs.as_ref()) {
            return Ok(false);
        }
        self.rebuild_graph()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> PersistedQueueState {
        PersistedQueueState {
            pending_paths: self.pending.iter().map(|p| slash_path(p)).collect(),
            active_jobs: self
                .jobs
                .iter()
                .map(|j| PersistedJob {
                    path: slash_path(&j.path),
                    state: j.state,
                    start_time: j.started_wall.and_then(epoch_millis),
                })
                .collect(),
        }
    }

    fn persist(&self) {
        let Some(path) = &self.options.state_path else {
            return;
        };
        if let Err(err) = self.snapshot().save(self.fs.as_ref(), path) {
            warn!(path = %path.display(), error = %err, "failed to persist queue state");
        }
    }

    /// Re-enqueue work left over from a previous run.
    ///
    /// Jobs that were active when the snapshot was taken can't be trusted
    /// (the process died mid-compile), so each one starts again from scratch.
    pub fn restore(&mut self, state: &PersistedQueueState) -> Vec<JobId> {
        if state.is_empty() {
            return Vec::new();
        }
        info!(
            active = state.active_jobs.len(),
            pending = state.pending_paths.len(),
            "restoring interrupted compile queue"
        );

        let mut ids = Vec::new();
        for raw in state.paths_to_resume() {
            let path = PathBuf::from(&raw);
            let is_master = self.graph.file(&path).is_some_and(|f| f.is_master());
            if !is_master {
                warn!(file = %raw, "persisted job no longer names a master file; dropping it");
                continue;
            }
            if self.mode == HostMode::Restricted {
                self.pending.push(path);
                continue;
            }
            match self.enqueue(&path, false) {
                Ok(id) => ids.push(id),
                Err(err) => warn!(file = %raw, error = %err, "could not restore compile job"),
            }
        }
        self.persist();
        ids
    }

    /// Load the snapshot from `state_path` (if any) and restore it.
    pub fn load_and_restore(&mut self) -> Result<Vec<JobId>> {
        let Some(path) = self.options.state_path.clone() else {
            return Ok(Vec::new());
        };
        match PersistedQueueState::load(self.fs.as_ref(), &path)? {
            Some(state) => Ok(self.restore(&state)),
            None => Ok(Vec::new()),
        }
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
