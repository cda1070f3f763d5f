use std::sync::{Arc, Mutex};

use inkwatch::engine::BatchSummary;
use inkwatch::host::Host;

/// Everything the orchestrator told the host, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Suspend,
    Release,
    Deferred,
    EnterRestricted,
    StackCompleted(BatchSummary),
}

/// A `Host` that records every hook call. `events()` on any clone sees the
/// same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &HostEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == wanted).count()
    }

    pub fn completed_batches(&self) -> Vec<BatchSummary> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                HostEvent::StackCompleted(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Host for RecordingHost {
    fn suspend_competing_rebuild(&mut self) {
        self.push(HostEvent::Suspend);
    }

    fn release_competing_rebuild(&mut self) {
        self.push(HostEvent::Release);
    }

    fn on_restricted_mode_deferred(&mut self) {
        self.push(HostEvent::Deferred);
    }

    fn enter_restricted_mode(&mut self) {
        self.push(HostEvent::EnterRestricted);
    }

    fn on_compilation_stack_completed(&mut self, summary: &BatchSummary) {
        self.push(HostEvent::StackCompleted(summary.clone()));
    }
}
