// src/watch/mod.rs

//! File watching.
//!
//! Turns `notify` events under the project root into
//! `RuntimeEvent::SourceChanged` for tracked source files. It knows nothing
//! about includes or masters; the file graph works those out.

pub mod path_utils;
pub mod watcher;

pub use path_utils::relative_path;
pub use watcher::{changed_sources, spawn_watcher, WatcherHandle};
