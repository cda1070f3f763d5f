// src/graph/mod.rs

//! Include graph over the project's narrative source files.

pub mod file_graph;
pub mod includes;
pub mod source_file;

pub use file_graph::{DiscoverReport, FileGraph, GraphOptions, IncludeMap, ARTIFACT_EXTENSION};
pub use includes::{extract_includes, resolve_include, strip_comments};
pub use source_file::{GraphIssue, SourceFile};
