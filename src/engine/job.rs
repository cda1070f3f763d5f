// src/engine/job.rs

//! One compile attempt for a master file.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// Monotonic job identity. Later jobs always have larger ids, so sorting by
/// id gives enqueue (FIFO) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Compiling,
    Complete,
}

#[derive(Debug, Clone)]
pub struct CompileJob {
    pub id: JobId,
    /// Master file, relative to the project root.
    pub path: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub state: JobState,
    /// Compile synchronously on the calling thread when picked.
    pub immediate: bool,
    pub started: Option<Instant>,
    /// Wall-clock start, for persistence.
    pub started_wall: Option<SystemTime>,
    pub ended: Option<Instant>,
    /// Raw compiler output lines, in order.
    pub output_lines: Vec<String>,
    pub unhandled_errors: Vec<String>,
    /// Compiled artifact bytes, if the compiler produced any.
    pub artifact: Option<Vec<u8>>,
}

impl CompileJob {
    pub fn new(
        id: JobId,
        path: PathBuf,
        input_path: PathBuf,
        output_path: PathBuf,
        immediate: bool,
    ) -> Self {
        Self {
            id,
            path,
            input_path,
            output_path,
            state: JobState::Queued,
            immediate,
            started: None,
            started_wall: None,
            ended: None,
            output_lines: Vec::new(),
            unhandled_errors: Vec::new(),
            artifact: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        debug_assert_eq!(self.state, JobState::Queued);
        self.state = JobState::Compiling;
        self.started = Some(now);
        self.started_wall = Some(SystemTime::now());
    }

    pub fn complete(&mut self, now: Instant) {
        debug_assert_eq!(self.state, JobState::Compiling);
        self.state = JobState::Complete;
        self.ended = Some(now);
    }

    pub fn is_compiling(&self) -> bool {
        self.state == JobState::Compiling
    }

    pub fn is_queued(&self) -> bool {
        self.state == JobState::Queued
    }

    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.started, self.ended) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => now.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Duration of a finished job.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.ended?.saturating_duration_since(self.started?))
    }
}
