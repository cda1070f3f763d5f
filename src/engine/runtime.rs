// src/engine/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::orchestrator::CompileOrchestrator;
use crate::engine::summary::BatchSummary;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

/// Options for the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Cadence of orchestrator polling ticks.
    pub poll_interval: Duration,
    /// Stop once no batch is outstanding (used for `--once`).
    pub exit_when_idle: bool,
}

/// Drives a [`CompileOrchestrator`]: forwards `RuntimeEvent`s into it and
/// calls its polling tick on a fixed interval.
///
/// All orchestrator state transitions happen on this task, except immediate
/// compile requests: those block until the compiler returns, so they run on
/// the blocking pool while this task waits for them.
pub struct Runtime {
    orchestrator: Arc<Mutex<CompileOrchestrator>>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    options: RuntimeOptions,
    last_batch: Option<BatchSummary>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.orchestrator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        orchestrator: CompileOrchestrator,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            event_rx,
            options,
            last_batch: None,
        }
    }

    fn orchestrator(&self) -> MutexGuard<'_, CompileOrchestrator> {
        self.orchestrator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Main event loop.
    ///
    /// Returns the summary of the last batch that drained, if any.
    pub async fn run(mut self) -> Result<Option<BatchSummary>> {
        info!("inkwatch runtime started");

        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        info!("runtime event channel closed; exiting");
                        break;
                    };
                    debug!(?event, "runtime received event");
                    if !self.handle_event(event).await {
                        info!("shutdown requested; stopping runtime");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let step = self.orchestrator().poll();
                    for path in &step.timed_out {
                        warn!(file = %path.display(), "compile abandoned after timeout");
                    }
                    if let Some(summary) = step.completed {
                        self.last_batch = Some(summary);
                    }
                    if self.options.exit_when_idle && !self.orchestrator().is_busy() {
                        info!("queue idle; exiting");
                        break;
                    }
                }
            }
        }

        self.orchestrator().shutdown();
        info!("runtime exiting");
        Ok(self.last_batch)
    }

    /// Apply one event. Returns false when the runtime should stop.
    async fn handle_event(&mut self, event: RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::SourceChanged { path } => {
                let masters = self.orchestrator().on_source_changed(&path);
                debug!(file = %path.display(), ?masters, "source change handled");
            }
            RuntimeEvent::CompileRequested {
                path,
                immediate: true,
            } => self.compile_immediately(path).await,
            RuntimeEvent::CompileRequested {
                path,
                immediate: false,
            } => {
                if let Err(err) = self.orchestrator().compile_file(&path, false) {
                    warn!(file = %path.display(), error = %err, "compile request rejected");
                }
            }
            RuntimeEvent::RecompileAll { force } => {
                if let Err(err) = self.orchestrator().compile_all(force) {
                    warn!(error = %err, "recompile-all failed");
                }
            }
            RuntimeEvent::EnterRestrictedModeRequested => {
                let transition = self.orchestrator().try_enter_restricted_mode();
                debug!(?transition, "restricted mode requested");
            }
            RuntimeEvent::HostModeChanged(mode) => {
                self.orchestrator().set_mode(mode, std::time::Instant::now());
            }
            RuntimeEvent::ShutdownRequested => return false,
        }
        true
    }

    /// Run an immediate compile off the async worker threads. The event loop
    /// waits for it, so no tick or other event interleaves with it.
    async fn compile_immediately(&self, path: PathBuf) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let result = tokio::task::spawn_blocking(move || {
            orchestrator
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .compile_file(&path, true)
                .map_err(|err| (path, err))
        })
        .await;

        match result {
            Ok(Ok(ids)) => debug!(?ids, "immediate compile finished"),
            Ok(Err((path, err))) => {
                warn!(file = %path.display(), error = %err, "compile request rejected")
            }
            Err(err) => warn!(error = %err, "immediate compile task failed"),
        }
    }
}
