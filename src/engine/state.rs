// src/engine/state.rs

//! Durable snapshot of queued and in-flight work.
//!
//! Written after every structural change to the queue so that a restart in
//! the middle of a batch doesn't silently lose work. On load, every job that
//! was still active is treated as stale and re-enqueued from scratch.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::job::JobState;
use crate::errors::{InkwatchError, Result};
use crate::fs::FileSystem;

/// File name of the snapshot inside the state directory.
pub const STATE_FILE: &str = "queue.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedJob {
    /// Master path relative to the project root, `/`-separated.
    pub path: String,
    pub state: JobState,
    /// Wall-clock start in milliseconds since the Unix epoch.
    #[serde(default)]
    pub start_time: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueueState {
    #[serde(default)]
    pub pending_paths: Vec<String>,
    #[serde(default)]
    pub active_jobs: Vec<PersistedJob>,
}

impl PersistedQueueState {
    pub fn is_empty(&self) -> bool {
        self.pending_paths.is_empty() && self.active_jobs.is_empty()
    }

    /// Every path that still needs compiling: active jobs first (in their
    /// original order), then pending paths. Duplicates are dropped.
    pub fn paths_to_resume(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let active = self.active_jobs.iter().map(|j| &j.path);
        for path in active.chain(self.pending_paths.iter()) {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
        out
    }

    /// Read the snapshot. A missing file is not an error.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Option<Self>> {
        if !fs.is_file(path) {
            debug!(path = %path.display(), "no persisted queue state");
            return Ok(None);
        }
        let text = fs.read_to_string(path)?;
        let state = serde_json::from_str(&text).map_err(|e| {
            InkwatchError::StateError(format!("cannot parse {}: {e}", path.display()))
        })?;
        Ok(Some(state))
    }

    pub fn save(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| InkwatchError::StateError(format!("cannot serialize queue state: {e}")))?;
        fs.write_atomic(path, &bytes)?;
        Ok(())
    }
}

pub fn epoch_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn uses_camel_case_record_layout() {
        let state = PersistedQueueState {
            pending_paths: vec!["b.ink".into()],
            active_jobs: vec![PersistedJob {
                path: "a.ink".into(),
                state: JobState::Compiling,
                start_time: Some(1_000),
            }],
        };
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["pendingPaths"][0], "b.ink");
        assert_eq!(json["activeJobs"][0]["state"], "compiling");
        assert_eq!(json["activeJobs"][0]["startTime"], 1_000);
    }

    #[test]
    fn load_save_through_filesystem() {
        let fs = MockFileSystem::new();
        let path = Path::new("/p/.inkwatch/queue.json");
        assert_eq!(PersistedQueueState::load(&fs, path).unwrap(), None);

        let state = PersistedQueueState {
            pending_paths: vec!["a.ink".into()],
            active_jobs: vec![],
        };
        state.save(&fs, path).unwrap();
        assert_eq!(PersistedQueueState::load(&fs, path).unwrap(), Some(state));
    }

    #[test]
    fn corrupt_state_is_a_state_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/queue.json", "{ not json");
        let err = PersistedQueueState::load(&fs, Path::new("/p/queue.json")).unwrap_err();
        assert!(matches!(err, InkwatchError::StateError(_)));
    }

    #[test]
    fn resume_order_puts_active_jobs_first() {
        let state = PersistedQueueState {
            pending_paths: vec!["c.ink".into(), "a.ink".into()],
            active_jobs: vec![
                PersistedJob {
                    path: "a.ink".into(),
                    state: JobState::Complete,
                    start_time: None,
                },
                PersistedJob {
                    path: "b.ink".into(),
                    state: JobState::Queued,
                    start_time: None,
                },
            ],
        };
        assert_eq!(state.paths_to_resume(), vec!["a.ink", "b.ink", "c.ink"]);
    }
}
