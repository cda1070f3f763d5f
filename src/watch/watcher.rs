// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::graph::GraphOptions;
use crate::watch::path_utils::relative_path;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Source files touched by one notify event, project-relative and deduped.
///
/// Pure access events are ignored; everything else (create, modify, remove,
/// rename) is a change.
pub fn changed_sources(root: &std::path::Path, options: &GraphOptions, event: &Event) -> Vec<PathBuf> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    let mut out = BTreeSet::new();
    for path in &event.paths {
        let Some(rel) = relative_path(root, path) else {
            debug!(path = %path.display(), "event path outside project root");
            continue;
        };
        if options.is_source_path(&rel) {
            out.insert(rel);
        }
    }
    out.into_iter().collect()
}

/// Watch `root` recursively and send `RuntimeEvent::SourceChanged` for every
/// source file that changes.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    options: GraphOptions,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("inkwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("inkwatch: file watch error: {err}"),
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            for path in changed_sources(&root, &options, &event) {
                debug!(file = %path.display(), kind = ?event.kind, "source changed");
                if runtime_tx
                    .send(RuntimeEvent::SourceChanged { path })
                    .await
                    .is_err()
                {
                    warn!("runtime is gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
