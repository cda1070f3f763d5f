// src/graph/source_file.rs

//! Per-file record kept by the [`FileGraph`](super::FileGraph).

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::diagnostics::{Diagnostic, Severity};

/// Structural problem with a file's place in the include graph.
///
/// These are attached to the offending file and never stop the rest of the
/// graph from being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// `INCLUDE` names a file that isn't tracked.
    MissingInclude { raw: String },
    /// `INCLUDE` climbs above the project root or is absolute.
    IncludeOutsideProject { raw: String },
    /// The file includes itself.
    SelfInclude { raw: String },
    /// Two files include each other; the include was dropped.
    MutualInclude { other: PathBuf },
    /// The file sits on a longer include cycle.
    IncludeCycle { members: Vec<PathBuf> },
    /// The file has parents but no master can be reached from it.
    NoMaster,
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::MissingInclude { raw } => {
                write!(f, "included file '{raw}' was not found")
            }
            GraphIssue::IncludeOutsideProject { raw } => {
                write!(f, "included file '{raw}' is outside the project")
            }
            GraphIssue::SelfInclude { raw } => write!(f, "file includes itself via '{raw}'"),
            GraphIssue::MutualInclude { other } => write!(
                f,
                "circular include: this file and {} include each other",
                other.display()
            ),
            GraphIssue::IncludeCycle { members } => {
                let names: Vec<String> =
                    members.iter().map(|p| p.display().to_string()).collect();
                write!(f, "include cycle: {}", names.join(" -> "))
            }
            GraphIssue::NoMaster => {
                write!(f, "file is included but no master file owns it")
            }
        }
    }
}

/// A tracked narrative source file.
///
/// `path` is relative to the project root and uses `/` separators.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Include paths exactly as written after `INCLUDE`.
    pub raw_includes: Vec<String>,
    /// Successfully resolved include targets.
    pub includes: Vec<PathBuf>,
    /// Files that include this one.
    pub parents: BTreeSet<PathBuf>,
    /// Root files that (transitively) include this one. Contains only the
    /// file itself for a master.
    pub masters: BTreeSet<PathBuf>,
    pub last_modified: Option<SystemTime>,
    pub last_compiled: Option<SystemTime>,
    /// Compiled artifact path (relative to the project root), masters only.
    pub artifact: Option<PathBuf>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub todos: Vec<Diagnostic>,
    /// Failures of the compiler itself (exceptions, timeouts), masters only.
    pub unhandled_errors: Vec<String>,
    pub issues: Vec<GraphIssue>,
}

impl SourceFile {
    pub fn new(path: PathBuf, last_modified: Option<SystemTime>) -> Self {
        Self {
            path,
            raw_includes: Vec::new(),
            includes: Vec::new(),
            parents: BTreeSet::new(),
            masters: BTreeSet::new(),
            last_modified,
            last_compiled: None,
            artifact: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            todos: Vec::new(),
            unhandled_errors: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// A file nobody includes is the root of its own include tree.
    pub fn is_master(&self) -> bool {
        self.parents.is_empty()
    }

    /// Master used for diagnostic aggregation when several masters own this
    /// file: the lexicographically smallest one.
    pub fn primary_master(&self) -> Option<&PathBuf> {
        self.masters.iter().next()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.unhandled_errors.is_empty()
    }

    pub fn has_unhandled_errors(&self) -> bool {
        !self.unhandled_errors.is_empty()
    }

    /// Files with parents but no reachable master can't be compiled.
    pub fn is_invalid(&self) -> bool {
        !self.parents.is_empty() && self.masters.is_empty()
    }

    pub fn clear_diagnostics(&mut self) {
        self.errors.clear();
        self.warnings.clear();
        self.todos.clear();
        self.unhandled_errors.clear();
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
            Severity::Author => self.todos.push(diagnostic),
        }
    }
}
