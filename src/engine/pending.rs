// src/engine/pending.rs

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Masters waiting for a safe moment to compile.
///
/// Paths land here when the host is in restricted mode, or when a master
/// changes again while it already has an active job. Entries are unique and
/// leave in the order they first arrived.
#[derive(Debug, Default, Clone)]
pub struct PendingList {
    order: VecDeque<PathBuf>,
    members: HashSet<PathBuf>,
}

impl PendingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.members.contains(path)
    }

    /// Returns false if `path` was already pending.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if !self.members.insert(path.clone()) {
            debug!(file = %path.display(), "already pending; coalescing");
            return false;
        }
        debug!(file = %path.display(), "added to pending list");
        self.order.push_back(path);
        true
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        if !self.members.remove(path) {
            return false;
        }
        self.order.retain(|p| p != path);
        true
    }

    /// Take every pending path, oldest first.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        self.members.clear();
        self.order.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.order.iter()
    }
}
