// src/graph/file_graph.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use globset::GlobSet;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info, warn};

use crate::diagnostics::Diagnostic;
use crate::fs::FileSystem;
use crate::graph::includes::{dir_of, extract_includes, normalize, resolve_include};
use crate::graph::source_file::{GraphIssue, SourceFile};

/// Include lookup table handed to compilers. See [`FileGraph::include_map`].
pub type IncludeMap = BTreeMap<(PathBuf, String), PathBuf>;

/// Extension used for compiled artifacts.
pub const ARTIFACT_EXTENSION: &str = "json";

/// How the graph finds source files and where artifacts go.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Source extension without the leading dot (e.g. `"ink"`).
    pub extension: String,
    /// Paths (relative, `/`-separated) that are never tracked.
    pub exclude: Option<GlobSet>,
    /// Directory for artifacts, relative to the root. `None` puts each
    /// artifact next to its master.
    pub output_dir: Option<PathBuf>,
}

impl GraphOptions {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            exclude: None,
            output_dir: None,
        }
    }

    /// Whether a project-relative path names a trackable source file:
    /// right extension, no hidden component, not excluded.
    pub fn is_source_path(&self, rel: &Path) -> bool {
        let ext_ok = rel
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !ext_ok {
            return false;
        }
        let hidden = rel.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|s| s.starts_with('.') && s != "." && s != "..")
        });
        if hidden {
            return false;
        }
        match &self.exclude {
            Some(set) => !set.is_match(rel.to_string_lossy().replace('\\', "/")),
            None => true,
        }
    }
}

/// Outcome of a [`FileGraph::discover`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverReport {
    /// Newly tracked files.
    pub added: Vec<PathBuf>,
    /// Files found on disk that couldn't be imported.
    pub skipped: Vec<PathBuf>,
}

/// Registry of every known source file and of who includes whom.
///
/// All paths handed in and out are relative to `root` with `/` separators;
/// [`FileGraph::absolute`] maps them back onto disk.
#[derive(Debug, Clone)]
pub struct FileGraph {
    root: PathBuf,
    options: GraphOptions,
    files: BTreeMap<PathBuf, SourceFile>,
}

impl FileGraph {
    pub fn new(root: impl Into<PathBuf>, options: GraphOptions) -> Self {
        Self {
            root: root.into(),
            options,
            files: BTreeMap::new(),
        }
    }

    /// Build a graph from scratch: discover, parse and link every file.
    pub fn build(
        root: impl Into<PathBuf>,
        options: GraphOptions,
        fs: &dyn FileSystem,
    ) -> Result<Self> {
        let mut graph = Self::new(root, options);
        graph.rebuild(fs)?;
        Ok(graph)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn absolute(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }

    /// Map an absolute (or already relative) path onto the project.
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return normalize(path);
        }
        let rel = path.strip_prefix(&self.root).ok()?;
        normalize(rel)
    }

    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether a project-relative path names a trackable source file.
    pub fn is_source_path(&self, rel: &Path) -> bool {
        self.options.is_source_path(rel)
    }

    /// Where the artifact for `master` lives, relative to the root.
    pub fn artifact_path(&self, master: &Path) -> PathBuf {
        let file = master.with_extension(ARTIFACT_EXTENSION);
        match &self.options.output_dir {
            Some(dir) => dir.join(file),
            None => file,
        }
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Scan the project for source files and start tracking new ones.
    ///
    /// Importing a file means reading its modification time. A failure is
    /// retried once; a second failure skips the file with a warning and the
    /// scan carries on.
    pub fn discover(&mut self, fs: &dyn FileSystem) -> Result<DiscoverReport> {
        let mut report = DiscoverReport::default();

        for rel in self.scan(fs)? {
            if self.files.contains_key(&rel) {
                continue;
            }

            let abs = self.absolute(&rel);
            let modified = fs.modified(&abs).or_else(|first| {
                debug!(file = %rel.display(), error = %first, "import failed; retrying once");
                fs.modified(&abs)
            });

            match modified {
                Ok(mtime) => {
                    let mut file = SourceFile::new(rel.clone(), Some(mtime));
                    let artifact = self.artifact_path(&rel);
                    if fs.is_file(&self.absolute(&artifact)) {
                        file.artifact = Some(artifact);
                    }
                    debug!(file = %rel.display(), "tracking new source file");
                    self.files.insert(rel.clone(), file);
                    report.added.push(rel);
                }
                Err(err) => {
                    warn!(
                        file = %rel.display(),
                        error = %err,
                        "could not import source file; skipping it"
                    );
                    report.skipped.push(rel);
                }
            }
        }

        Ok(report)
    }

    /// All source files currently on disk, relative to the root, sorted.
    fn scan(&self, fs: &dyn FileSystem) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let rel = rel.to_path_buf();
                if fs.is_dir(&path) {
                    let hidden = rel
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with('.'));
                    if !hidden {
                        stack.push(path);
                    }
                } else if self.is_source_path(&rel) {
                    found.push(rel);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Includes
    // ------------------------------------------------------------------

    /// Read `path` and return its raw, unresolved include strings.
    pub fn parse_includes(&self, fs: &dyn FileSystem, path: &Path) -> Result<Vec<String>> {
        let text = fs.read_to_string(&self.absolute(path))?;
        Ok(extract_includes(&text))
    }

    /// Re-read a tracked file's includes and modification time.
    fn reparse(&mut self, fs: &dyn FileSystem, path: &Path) {
        let raw = match self.parse_includes(fs, path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "could not read source file");
                Vec::new()
            }
        };
        let modified = fs.modified(&self.absolute(path)).ok();

        if let Some(file) = self.files.get_mut(path) {
            file.raw_includes = raw;
            if modified.is_some() {
                file.last_modified = modified;
            }
        }
    }

    /// Raw includes of `path` resolved to paths, without any validity checks.
    fn raw_targets(&self, path: &Path) -> Vec<PathBuf> {
        let Some(file) = self.files.get(path) else {
            return Vec::new();
        };
        let base = dir_of(path);
        file.raw_includes
            .iter()
            .filter_map(|raw| resolve_include(base, raw))
            .collect()
    }

    /// Resolve the raw includes of `path` against the tracked files.
    ///
    /// Unresolvable, self and mutual includes are dropped and recorded as
    /// [`GraphIssue`]s on `path`.
    pub fn resolve_includes(&mut self, path: &Path) {
        let Some(file) = self.files.get(path) else {
            return;
        };
        let base = dir_of(path).to_path_buf();
        let raw_includes = file.raw_includes.clone();

        let mut includes: Vec<PathBuf> = Vec::new();
        let mut issues: Vec<GraphIssue> = Vec::new();

        for raw in raw_includes {
            match resolve_include(&base, &raw) {
                None => issues.push(GraphIssue::IncludeOutsideProject { raw }),
                Some(target) if target == path => issues.push(GraphIssue::SelfInclude { raw }),
                Some(target) if !self.files.contains_key(&target) => {
                    issues.push(GraphIssue::MissingInclude { raw })
                }
                Some(target) if self.raw_targets(&target).iter().any(|t| t == path) => {
                    issues.push(GraphIssue::MutualInclude { other: target })
                }
                Some(target) => {
                    if !includes.contains(&target) {
                        includes.push(target);
                    }
                }
            }
        }

        for issue in &issues {
            warn!(file = %path.display(), "{}", issue);
        }

        if let Some(file) = self.files.get_mut(path) {
            file.includes = includes;
            file.issues = issues;
        }
    }

    fn resolve_all(&mut self) {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in paths {
            self.resolve_includes(&path);
        }
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    /// Recompute parents and masters for every file.
    ///
    /// Pass 1 records each include as a parent edge on its target. Pass 2
    /// walks parent edges upwards from every file; the files where the walk
    /// stops (no parents) are its masters.
    pub fn rebuild_ownership(&mut self) {
        for file in self.files.values_mut() {
            file.parents.clear();
            file.masters.clear();
            file.issues
                .retain(|i| !matches!(i, GraphIssue::IncludeCycle { .. } | GraphIssue::NoMaster));
        }

        let edges: Vec<(PathBuf, PathBuf)> = self
            .files
            .values()
            .flat_map(|f| f.includes.iter().map(|t| (f.path.clone(), t.clone())))
            .collect();
        for (parent, child) in edges {
            if let Some(file) = self.files.get_mut(&child) {
                file.parents.insert(parent);
            }
        }

        for members in self.find_cycles() {
            warn!(?members, "include cycle detected");
            for member in &members {
                if let Some(file) = self.files.get_mut(member) {
                    file.issues.push(GraphIssue::IncludeCycle {
                        members: members.clone(),
                    });
                }
            }
        }

        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in paths {
            let masters = self.walk_to_masters(&path);
            let Some(file) = self.files.get_mut(&path) else {
                continue;
            };
            file.masters = masters;

            if file.is_invalid() {
                warn!(file = %path.display(), "file is included but has no master");
                file.issues.push(GraphIssue::NoMaster);
            } else if file.masters.len() > 1 {
                warn!(
                    file = %path.display(),
                    masters = ?file.masters,
                    "file is owned by more than one master"
                );
            }
        }
    }

    fn walk_to_masters(&self, start: &Path) -> BTreeSet<PathBuf> {
        let mut masters = BTreeSet::new();
        let mut visited: HashSet<&Path> = HashSet::new();
        let mut stack: Vec<&Path> = vec![start];

        while let Some(path) = stack.pop() {
            if !visited.insert(path) {
                continue;
            }
            let Some(file) = self.files.get(path) else {
                continue;
            };
            if file.parents.is_empty() {
                masters.insert(file.path.clone());
            } else {
                stack.extend(file.parents.iter().map(|p| p.as_path()));
            }
        }

        masters
    }

    /// Include cycles longer than two files (shorter ones never become edges).
    fn find_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut graph: DiGraphMap<&Path, ()> = DiGraphMap::new();
        for file in self.files.values() {
            graph.add_node(file.path.as_path());
            for target in &file.includes {
                graph.add_edge(file.path.as_path(), target.as_path(), ());
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<PathBuf> = scc.into_iter().map(Path::to_path_buf).collect();
                members.sort();
                members
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Validation / rebuild
    // ------------------------------------------------------------------

    /// Cheap structural check against the graph itself and the disk.
    /// Returns a description of every problem found.
    ///
    /// Catches tracked files that vanished and dangling includes whose target
    /// has since appeared. A brand-new file nothing includes yet is only
    /// picked up by [`rebuild`](Self::rebuild) or
    /// [`refresh_file`](Self::refresh_file).
    pub fn validate(&self, fs: &dyn FileSystem) -> Vec<String> {
        let mut problems = Vec::new();

        for (key, file) in &self.files {
            if key != &file.path {
                problems.push(format!(
                    "index key {} doesn't match file {}",
                    key.display(),
                    file.path.display()
                ));
            }
            if !fs.is_file(&self.absolute(key)) {
                problems.push(format!("{} no longer exists", key.display()));
            }
            for target in &file.includes {
                match self.files.get(target) {
                    None => problems.push(format!(
                        "{} includes untracked file {}",
                        key.display(),
                        target.display()
                    )),
                    Some(child) if !child.parents.contains(key) => problems.push(format!(
                        "{} is missing parent edge from {}",
                        target.display(),
                        key.display()
                    )),
                    Some(_) => {}
                }
            }
            for issue in &file.issues {
                let GraphIssue::MissingInclude { raw } = issue else {
                    continue;
                };
                let appeared = resolve_include(dir_of(key), raw)
                    .is_some_and(|target| fs.is_file(&self.absolute(&target)));
                if appeared {
                    problems.push(format!(
                        "{} includes {raw}, which exists now",
                        key.display()
                    ));
                }
            }
            for parent in &file.parents {
                let linked = self
                    .files
                    .get(parent)
                    .is_some_and(|p| p.includes.contains(key));
                if !linked {
                    problems.push(format!(
                        "{} lists stale parent {}",
                        key.display(),
                        parent.display()
                    ));
                }
            }
        }

        problems
    }

    pub fn requires_rebuild(&self, fs: &dyn FileSystem) -> bool {
        let problems = self.validate(fs);
        for problem in &problems {
            debug!(%problem, "file graph is inconsistent");
        }
        !problems.is_empty()
    }

    /// Forget vanished files, discover new ones, re-parse everything and
    /// recompute ownership. Diagnostics from earlier compiles are kept.
    pub fn rebuild(&mut self, fs: &dyn FileSystem) -> Result<()> {
        let vanished: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|p| !fs.is_file(&self.root.join(p)))
            .cloned()
            .collect();
        for path in &vanished {
            debug!(file = %path.display(), "pruning vanished source file");
            self.files.remove(path);
        }

        let report = self.discover(fs)?;

        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in &paths {
            self.reparse(fs, path);
        }
        self.resolve_all();
        self.rebuild_ownership();

        info!(
            files = self.files.len(),
            masters = self.master_files().len(),
            added = report.added.len(),
            pruned = vanished.len(),
            "file graph rebuilt"
        );
        Ok(())
    }

    /// Bring a single changed, created or deleted file up to date.
    ///
    /// Returns the masters that should be recompiled because of the change:
    /// the union of the file's masters before and after.
    pub fn refresh_file(&mut self, fs: &dyn FileSystem, path: &Path) -> Vec<PathBuf> {
        let before: BTreeSet<PathBuf> = self
            .files
            .get(path)
            .map(|f| f.masters.clone())
            .unwrap_or_default();

        if fs.is_file(&self.absolute(path)) {
            if !self.files.contains_key(path) {
                if !self.is_source_path(path) {
                    return Vec::new();
                }
                debug!(file = %path.display(), "tracking new source file");
                self.files
                    .insert(path.to_path_buf(), SourceFile::new(path.to_path_buf(), None));
            }
            self.reparse(fs, path);
        } else if self.files.remove(path).is_some() {
            debug!(file = %path.display(), "source file removed");
        } else {
            return Vec::new();
        }

        // Any other file's include may now resolve differently.
        self.resolve_all();
        self.rebuild_ownership();

        let after: BTreeSet<PathBuf> = self
            .files
            .get(path)
            .map(|f| f.masters.clone())
            .unwrap_or_default();

        before
            .union(&after)
            .filter(|m| self.files.get(*m).is_some_and(|f| f.is_master()))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Master queries
    // ------------------------------------------------------------------

    pub fn master_files(&self) -> Vec<&SourceFile> {
        self.files.values().filter(|f| f.is_master()).collect()
    }

    /// `master` followed by every file it transitively includes.
    pub fn family_of(&self, master: &Path) -> Vec<PathBuf> {
        let mut family = Vec::new();
        let mut visited: HashSet<&Path> = HashSet::new();
        let mut stack: Vec<&Path> = vec![master];

        while let Some(path) = stack.pop() {
            if !visited.insert(path) {
                continue;
            }
            let Some(file) = self.files.get(path) else {
                continue;
            };
            family.push(file.path.clone());
            stack.extend(file.includes.iter().rev().map(|p| p.as_path()));
        }

        family
    }

    /// Masters whose artifact is missing, older than any file in the family,
    /// or whose last compile failed outright.
    pub fn files_requiring_recompile(&self, fs: &dyn FileSystem) -> Vec<PathBuf> {
        self.master_files()
            .into_iter()
            .filter(|master| self.requires_recompile(fs, master))
            .map(|master| master.path.clone())
            .collect()
    }

    fn requires_recompile(&self, fs: &dyn FileSystem, master: &SourceFile) -> bool {
        if master.has_unhandled_errors() {
            return true;
        }

        let artifact = self.absolute(&self.artifact_path(&master.path));
        let Ok(artifact_mtime) = fs.modified(&artifact) else {
            return true;
        };

        self.family_of(&master.path).iter().any(|path| {
            let source_mtime = fs
                .modified(&self.absolute(path))
                .ok()
                .or_else(|| self.files.get(path).and_then(|f| f.last_modified));
            source_mtime.is_some_and(|m| m > artifact_mtime)
        })
    }

    /// Whether any file in `master`'s family carries an error.
    pub fn family_has_errors(&self, master: &Path) -> bool {
        self.family_of(master)
            .iter()
            .filter_map(|p| self.files.get(p))
            .any(|f| f.has_errors())
    }

    /// `(including file, raw include)` -> absolute path, across `master`'s
    /// family.
    ///
    /// Handed to the compiler so it resolves includes exactly like the graph:
    /// the same raw string can name different files in different directories.
    pub fn include_map(&self, master: &Path) -> IncludeMap {
        let mut map = IncludeMap::new();
        for path in self.family_of(master) {
            let Some(file) = self.files.get(&path) else {
                continue;
            };
            let base = dir_of(&path);
            for raw in &file.raw_includes {
                if let Some(target) = resolve_include(base, raw) {
                    if self.files.contains_key(&target) {
                        map.insert((path.clone(), raw.trim().to_string()), self.absolute(&target));
                    }
                }
            }
        }
        map
    }

    // ------------------------------------------------------------------
    // Compile results
    // ------------------------------------------------------------------

    /// Replace the diagnostics produced by compiling `master`.
    ///
    /// A diagnostic lands on the family file it names when `master` is that
    /// file's primary master; otherwise it stays on `master` itself.
    pub fn apply_compile_result(
        &mut self,
        master: &Path,
        diagnostics: &[Diagnostic],
        unhandled_errors: &[String],
        artifact: Option<PathBuf>,
        compiled_at: SystemTime,
    ) {
        let family = self.family_of(master);

        for path in &family {
            if let Some(file) = self.files.get_mut(path) {
                if path == master || file.primary_master().is_some_and(|m| m == master) {
                    file.clear_diagnostics();
                }
            }
        }

        for diagnostic in diagnostics {
            let owner = diagnostic
                .file
                .as_deref()
                .and_then(|name| self.match_family_file(master, &family, name))
                .filter(|target| {
                    target.as_path() == master
                        || self
                            .files
                            .get(target)
                            .and_then(|f| f.primary_master())
                            .is_some_and(|m| m == master)
                })
                .unwrap_or_else(|| master.to_path_buf());

            if let Some(file) = self.files.get_mut(&owner) {
                file.push_diagnostic(diagnostic.clone());
            }
        }

        if let Some(file) = self.files.get_mut(master) {
            file.unhandled_errors = unhandled_errors.to_vec();
            file.last_compiled = Some(compiled_at);
            if artifact.is_some() {
                file.artifact = artifact;
            }
        }
    }

    /// Find the family file a compiler-reported name refers to.
    fn match_family_file(&self, master: &Path, family: &[PathBuf], name: &str) -> Option<PathBuf> {
        if let Some(resolved) = resolve_include(dir_of(master), name) {
            if family.contains(&resolved) {
                return Some(resolved);
            }
        }
        let name = name.replace('\\', "/");
        family
            .iter()
            .find(|p| {
                let p = p.to_string_lossy().replace('\\', "/");
                p == name || p.ends_with(&format!("/{name}"))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::fs::mock::MockFileSystem;

    const ROOT: &str = "/proj";

    fn project(files: &[(&str, &str)]) -> (MockFileSystem, FileGraph) {
        let fs = MockFileSystem::new();
        for (path, content) in files {
            fs.add_file(format!("{ROOT}/{path}"), *content);
        }
        let graph = FileGraph::build(ROOT, GraphOptions::new("ink"), &fs).unwrap();
        (fs, graph)
    }

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn masters_of(graph: &FileGraph, path: &str) -> Vec<PathBuf> {
        graph.file(&p(path)).unwrap().masters.iter().cloned().collect()
    }

    #[test]
    fn discovers_only_source_files() {
        let (_fs, graph) = project(&[
            ("main.ink", ""),
            ("notes.txt", ""),
            ("sub/part.ink", ""),
            (".hidden/x.ink", ""),
        ]);
        let paths: Vec<_> = graph.files().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![p("main.ink"), p("sub/part.ink")]);
    }

    #[test]
    fn builds_parents_and_masters() {
        let (_fs, graph) = project(&[
            ("main.ink", "INCLUDE chapters/one.ink\nINCLUDE chapters/two.ink\n"),
            ("chapters/one.ink", "INCLUDE ../common.ink\n"),
            ("chapters/two.ink", ""),
            ("common.ink", ""),
        ]);

        let masters: Vec<_> = graph.master_files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(masters, vec![p("main.ink")]);
        assert_eq!(masters_of(&graph, "common.ink"), vec![p("main.ink")]);
        assert_eq!(masters_of(&graph, "main.ink"), vec![p("main.ink")]);
        assert!(graph
            .file(&p("common.ink"))
            .unwrap()
            .parents
            .contains(&p("chapters/one.ink")));
        assert_eq!(
            graph.family_of(&p("main.ink")),
            vec![
                p("main.ink"),
                p("chapters/one.ink"),
                p("common.ink"),
                p("chapters/two.ink")
            ]
        );
    }

    #[test]
    fn shared_include_has_two_masters() {
        let (_fs, graph) = project(&[
            ("a.ink", "INCLUDE shared.ink"),
            ("b.ink", "INCLUDE shared.ink"),
            ("shared.ink", ""),
        ]);
        assert_eq!(masters_of(&graph, "shared.ink"), vec![p("a.ink"), p("b.ink")]);
        assert_eq!(
            graph.file(&p("shared.ink")).unwrap().primary_master(),
            Some(&p("a.ink"))
        );
    }

    #[test]
    fn missing_include_is_attached_to_includer() {
        let (_fs, graph) = project(&[("main.ink", "INCLUDE gone.ink\n")]);
        let main = graph.file(&p("main.ink")).unwrap();
        assert!(main.includes.is_empty());
        assert_eq!(
            main.issues,
            vec![GraphIssue::MissingInclude {
                raw: "gone.ink".to_string()
            }]
        );
        assert!(main.is_master());
    }

    #[test]
    fn mutual_include_is_rejected_both_ways() {
        let (_fs, graph) = project(&[("a.ink", "INCLUDE b.ink"), ("b.ink", "INCLUDE a.ink")]);
        let a = graph.file(&p("a.ink")).unwrap();
        let b = graph.file(&p("b.ink")).unwrap();
        assert!(a.includes.is_empty());
        assert!(b.includes.is_empty());
        assert!(a
            .issues
            .contains(&GraphIssue::MutualInclude { other: p("b.ink") }));
        assert!(a.is_master() && b.is_master());
    }

    #[test]
    fn self_include_is_rejected() {
        let (_fs, graph) = project(&[("a.ink", "INCLUDE a.ink")]);
        let a = graph.file(&p("a.ink")).unwrap();
        assert!(a.includes.is_empty());
        assert!(matches!(a.issues[0], GraphIssue::SelfInclude { .. }));
    }

    #[test]
    fn longer_cycle_leaves_members_without_master() {
        let (_fs, graph) = project(&[
            ("a.ink", "INCLUDE b.ink"),
            ("b.ink", "INCLUDE c.ink"),
            ("c.ink", "INCLUDE a.ink"),
        ]);
        for name in ["a.ink", "b.ink", "c.ink"] {
            let f = graph.file(&p(name)).unwrap();
            assert!(f.is_invalid(), "{name} should be invalid");
            assert!(f.issues.contains(&GraphIssue::NoMaster));
            assert!(f
                .issues
                .iter()
                .any(|i| matches!(i, GraphIssue::IncludeCycle { .. })));
        }
        assert!(graph.master_files().is_empty());
    }

    #[test]
    fn exclude_globs_and_output_dir() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/main.ink", "");
        fs.add_file("/proj/drafts/wip.ink", "");
        let mut builder = globset::GlobSetBuilder::new();
        builder.add(globset::Glob::new("drafts/**").unwrap());
        let mut options = GraphOptions::new("ink");
        options.exclude = Some(builder.build().unwrap());
        options.output_dir = Some(p("build"));

        let graph = FileGraph::build(ROOT, options, &fs).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.artifact_path(&p("main.ink")), p("build/main.json"));
    }

    #[test]
    fn import_failure_is_retried_once_then_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/flaky.ink", "");
        fs.add_file("/proj/broken.ink", "");
        fs.add_file("/proj/fine.ink", "");
        fs.fail_metadata("/proj/flaky.ink", 1);
        fs.fail_metadata("/proj/broken.ink", 2);

        let mut graph = FileGraph::new(ROOT, GraphOptions::new("ink"));
        let report = graph.discover(&fs).unwrap();
        assert_eq!(report.added, vec![p("fine.ink"), p("flaky.ink")]);
        assert_eq!(report.skipped, vec![p("broken.ink")]);

        // A later discovery picks it up.
        let report = graph.discover(&fs).unwrap();
        assert_eq!(report.added, vec![p("broken.ink")]);
    }

    #[test]
    fn validate_detects_vanished_files() {
        let (fs, graph) = project(&[("main.ink", "INCLUDE a.ink"), ("a.ink", "")]);
        assert!(!graph.requires_rebuild(&fs));
        fs.remove("/proj/a.ink");
        assert!(graph.requires_rebuild(&fs));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let (fs, mut graph) = project(&[
            ("main.ink", "INCLUDE a.ink\nINCLUDE b.ink"),
            ("a.ink", "INCLUDE b.ink"),
            ("b.ink", ""),
            ("other.ink", "INCLUDE b.ink"),
        ]);
        let before: Vec<SourceFile> = graph.files().cloned().collect();
        graph.rebuild(&fs).unwrap();
        let after: Vec<SourceFile> = graph.files().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn refresh_picks_up_new_include() {
        let (fs, mut graph) = project(&[("main.ink", ""), ("extra.ink", "")]);
        assert_eq!(graph.master_files().len(), 2);

        fs.add_file("/proj/main.ink", "INCLUDE extra.ink\n");
        let masters = graph.refresh_file(&fs, &p("main.ink"));
        assert_eq!(masters, vec![p("main.ink")]);
        assert_eq!(masters_of(&graph, "extra.ink"), vec![p("main.ink")]);

        // Editing the include recompiles its master.
        fs.touch("/proj/extra.ink");
        assert_eq!(graph.refresh_file(&fs, &p("extra.ink")), vec![p("main.ink")]);
    }

    #[test]
    fn validate_notices_a_missing_include_that_appeared() {
        let (fs, mut graph) = project(&[("main.ink", "INCLUDE later.ink\n")]);
        assert!(graph.validate(&fs).is_empty());

        fs.add_file("/proj/later.ink", "Later.\n");
        let problems = graph.validate(&fs);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("later.ink"), "{problems:?}");
        assert!(graph.requires_rebuild(&fs));

        graph.rebuild(&fs).unwrap();
        assert!(!graph.requires_rebuild(&fs));
        assert_eq!(masters_of(&graph, "later.ink"), vec![p("main.ink")]);
    }

    #[test]
    fn refresh_handles_created_and_removed_includes() {
        let (fs, mut graph) = project(&[("main.ink", "INCLUDE later.ink\n")]);
        assert!(!graph.file(&p("main.ink")).unwrap().issues.is_empty());

        fs.add_file("/proj/later.ink", "");
        let masters = graph.refresh_file(&fs, &p("later.ink"));
        assert_eq!(masters, vec![p("main.ink")]);
        assert!(graph.file(&p("main.ink")).unwrap().issues.is_empty());

        fs.remove("/proj/later.ink");
        let masters = graph.refresh_file(&fs, &p("later.ink"));
        assert_eq!(masters, vec![p("main.ink")]);
        assert!(graph.file(&p("later.ink")).is_none());
    }

    #[test]
    fn recompile_needed_when_artifact_missing_or_stale() {
        let (fs, graph) = project(&[("main.ink", "INCLUDE a.ink"), ("a.ink", "")]);
        assert_eq!(graph.files_requiring_recompile(&fs), vec![p("main.ink")]);

        fs.add_file("/proj/main.json", "{}");
        assert!(graph.files_requiring_recompile(&fs).is_empty());

        fs.touch("/proj/a.ink");
        assert_eq!(graph.files_requiring_recompile(&fs), vec![p("main.ink")]);
    }

    #[test]
    fn diagnostics_follow_primary_master() {
        let (_fs, mut graph) = project(&[
            ("a.ink", "INCLUDE shared.ink\nINCLUDE own.ink"),
            ("b.ink", "INCLUDE shared.ink"),
            ("shared.ink", ""),
            ("own.ink", ""),
        ]);

        let diag = |file: &str| Diagnostic {
            severity: Severity::Error,
            file: Some(file.to_string()),
            line: Some(1),
            message: "x".to_string(),
        };

        graph.apply_compile_result(
            &p("a.ink"),
            &[diag("shared.ink"), diag("own.ink")],
            &[],
            None,
            SystemTime::now(),
        );
        assert_eq!(graph.file(&p("shared.ink")).unwrap().errors.len(), 1);
        assert_eq!(graph.file(&p("own.ink")).unwrap().errors.len(), 1);

        // b.ink is not shared.ink's primary master: its report stays on b.ink.
        graph.apply_compile_result(&p("b.ink"), &[diag("shared.ink")], &[], None, SystemTime::now());
        assert_eq!(graph.file(&p("shared.ink")).unwrap().errors.len(), 1);
        assert_eq!(graph.file(&p("b.ink")).unwrap().errors.len(), 1);
        assert!(graph.family_has_errors(&p("b.ink")));

        // Recompiling a.ink cleanly clears what it reported earlier.
        graph.apply_compile_result(&p("a.ink"), &[], &[], Some(p("a.json")), SystemTime::now());
        assert!(graph.file(&p("shared.ink")).unwrap().errors.is_empty());
        assert!(!graph.family_has_errors(&p("a.ink")));
        assert_eq!(graph.file(&p("a.ink")).unwrap().artifact, Some(p("a.json")));
    }

    #[test]
    fn include_map_resolves_family_includes() {
        let (_fs, graph) = project(&[
            ("main.ink", "INCLUDE sub/one.ink"),
            ("sub/one.ink", "INCLUDE two.ink"),
            ("sub/two.ink", ""),
        ]);
        let map = graph.include_map(&p("main.ink"));
        let key = |from: &str, raw: &str| (p(from), raw.to_string());
        assert_eq!(map.get(&key("main.ink", "sub/one.ink")), Some(&p("/proj/sub/one.ink")));
        assert_eq!(map.get(&key("sub/one.ink", "two.ink")), Some(&p("/proj/sub/two.ink")));
    }

    #[test]
    fn include_map_keeps_same_named_includes_apart() {
        let (_fs, graph) = project(&[
            ("main.ink", "INCLUDE a/x.ink\nINCLUDE b/x.ink"),
            ("a/x.ink", "INCLUDE common.ink"),
            ("b/x.ink", "INCLUDE common.ink"),
            ("a/common.ink", "A"),
            ("b/common.ink", "B"),
        ]);
        let map = graph.include_map(&p("main.ink"));
        assert_eq!(map.len(), 4);
        assert_eq!(
            map.get(&(p("a/x.ink"), "common.ink".to_string())),
            Some(&p("/proj/a/common.ink"))
        );
        assert_eq!(
            map.get(&(p("b/x.ink"), "common.ink".to_string())),
            Some(&p("/proj/b/common.ink"))
        );
    }
}
