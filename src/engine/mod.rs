// src/engine/mod.rs

//! Compile orchestration engine.
//!
//! - [`orchestrator`] holds the scheduler itself: job queue, the single
//!   outstanding worker, timeouts, host-mode coordination and batch
//!   completion. It is synchronous and driven by polling ticks.
//! - [`runtime`] is the async shell that feeds it watcher/host events and
//!   ticks it on an interval.
//! - [`job`], [`pending`], [`state`] and [`summary`] are the data it works
//!   with.

use std::path::PathBuf;

use crate::types::HostMode;

/// Events flowing into the runtime from the watcher, the host and signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A source file was created, modified or removed (project-relative).
    SourceChanged { path: PathBuf },
    /// Explicit request to compile the masters owning `path`.
    CompileRequested { path: PathBuf, immediate: bool },
    /// Compile stale masters, or every master with `force`.
    RecompileAll { force: bool },
    /// The host wants to enter restricted mode.
    EnterRestrictedModeRequested,
    /// The host already switched modes.
    HostModeChanged(HostMode),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod job;
pub mod orchestrator;
pub mod pending;
pub mod runtime;
pub mod state;
pub mod summary;

pub use job::{CompileJob, JobId, JobState};
pub use orchestrator::{CompileOrchestrator, OrchestratorOptions, PollStep};
pub use pending::PendingList;
pub use runtime::{Runtime, RuntimeOptions};
pub use state::{PersistedJob, PersistedQueueState};
pub use summary::BatchSummary;
