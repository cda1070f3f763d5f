// src/host.rs

//! Hooks the orchestrator calls into on the embedding host.
//!
//! The host is whatever drives the orchestrator: an editor integration, a
//! game engine plugin, or the `inkwatch` CLI. Every hook has a no-op default
//! so a host only overrides what it cares about.

use std::fmt::Debug;

use tracing::info;

use crate::engine::summary::BatchSummary;

pub trait Host: Send + Debug {
    /// A batch is starting. The host should hold off any rebuild of its own
    /// that could end up invoking the compiler concurrently.
    fn suspend_competing_rebuild(&mut self) {}

    /// The batch drained; competing rebuilds may resume.
    fn release_competing_rebuild(&mut self) {}

    /// Entering restricted mode was blocked by an active batch.
    fn on_restricted_mode_deferred(&mut self) {}

    /// Replay of a deferred restricted-mode entry. Called exactly once per
    /// deferral, after a batch that ended without errors.
    fn enter_restricted_mode(&mut self) {}

    /// Public "compilation stack completed" event.
    fn on_compilation_stack_completed(&mut self, _summary: &BatchSummary) {}
}

/// Host used by the command-line binary: it only logs.
#[derive(Debug, Default)]
pub struct LoggingHost;

impl Host for LoggingHost {
    fn on_restricted_mode_deferred(&mut self) {
        info!("restricted mode deferred until the current batch finishes");
    }

    fn enter_restricted_mode(&mut self) {
        info!("entering restricted mode");
    }

    fn on_compilation_stack_completed(&mut self, summary: &BatchSummary) {
        info!(
            compiled = summary.compiled.len(),
            errors = summary.errors,
            warnings = summary.warnings,
            todos = summary.todos,
            unhandled = summary.unhandled,
            has_errors = summary.has_errors,
            "compilation stack completed"
        );
    }
}
