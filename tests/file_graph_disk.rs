// tests/file_graph_disk.rs

mod common;
use crate::common::{init_tracing, p, ps};

use std::fs;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use tempfile::TempDir;

use inkwatch::fs::RealFileSystem;
use inkwatch::graph::{FileGraph, GraphIssue, GraphOptions};

fn write(dir: &TempDir, rel: &str, content: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn set_mtime(dir: &TempDir, rel: &str, secs: u64) {
    let file = fs::File::options()
        .write(true)
        .open(dir.path().join(rel))
        .unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
}

fn build(dir: &TempDir) -> FileGraph {
    FileGraph::build(dir.path(), GraphOptions::new("ink"), &RealFileSystem).unwrap()
}

fn story(dir: &TempDir) {
    write(dir, "main.ink", "INCLUDE chapters/one.ink\nINCLUDE shared/vars.ink\n");
    write(dir, "chapters/one.ink", "// INCLUDE not/really.ink\n=== one ===\n");
    write(dir, "shared/vars.ink", "VAR gold = 0\n");
    write(dir, "side.ink", "INCLUDE shared/vars.ink\n");
    write(dir, "notes.txt", "INCLUDE main.ink\n");
    write(dir, ".git/hooks/x.ink", "hidden\n");
}

#[test]
fn builds_ownership_from_disk() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    story(&dir);

    let graph = build(&dir);

    assert_eq!(graph.len(), 4);
    assert!(graph.file(Path::new("notes.txt")).is_none());
    assert!(graph.file(Path::new(".git/hooks/x.ink")).is_none());

    let masters: Vec<_> = graph.master_files().iter().map(|f| f.path.clone()).collect();
    assert_eq!(masters, ps(&["main.ink", "side.ink"]));

    let vars = graph.file(Path::new("shared/vars.ink")).unwrap();
    assert_eq!(
        vars.masters.iter().cloned().collect::<Vec<_>>(),
        ps(&["main.ink", "side.ink"])
    );
    assert_eq!(vars.primary_master(), Some(&p("main.ink")));

    // Commented-out includes are ignored.
    let one = graph.file(Path::new("chapters/one.ink")).unwrap();
    assert!(one.raw_includes.is_empty());
    assert!(one.issues.is_empty());

    assert_eq!(
        graph.family_of(Path::new("main.ink")),
        ps(&["main.ink", "chapters/one.ink", "shared/vars.ink"])
    );
    assert!(graph.validate(&RealFileSystem).is_empty());
}

#[test]
fn staleness_follows_the_whole_family() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    story(&dir);
    for rel in ["main.ink", "chapters/one.ink", "shared/vars.ink", "side.ink"] {
        set_mtime(&dir, rel, 1_000);
    }
    let graph = build(&dir);
    assert_eq!(
        graph.files_requiring_recompile(&RealFileSystem),
        ps(&["main.ink", "side.ink"])
    );

    write(&dir, "main.json", "{}");
    set_mtime(&dir, "main.json", 2_000);
    assert_eq!(graph.files_requiring_recompile(&RealFileSystem), ps(&["side.ink"]));

    set_mtime(&dir, "chapters/one.ink", 3_000);
    assert_eq!(
        graph.files_requiring_recompile(&RealFileSystem),
        ps(&["main.ink", "side.ink"])
    );
}

#[test]
fn existing_artifacts_are_picked_up_on_discovery() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    story(&dir);
    write(&dir, "side.json", "{}");

    let graph = build(&dir);
    assert_eq!(
        graph.file(Path::new("side.ink")).unwrap().artifact,
        Some(p("side.json"))
    );
    assert_eq!(graph.file(Path::new("main.ink")).unwrap().artifact, None);
}

#[test]
fn structural_problems_are_recorded_not_fatal() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write(&dir, "main.ink", "INCLUDE nope.ink\nINCLUDE ../outside.ink\nINCLUDE main.ink\n");
    write(&dir, "x.ink", "INCLUDE y.ink\n");
    write(&dir, "y.ink", "INCLUDE x.ink\n");
    write(&dir, "loop/a.ink", "INCLUDE b.ink\n");
    write(&dir, "loop/b.ink", "INCLUDE c.ink\n");
    write(&dir, "loop/c.ink", "INCLUDE a.ink\n");

    let graph = build(&dir);

    let main = graph.file(Path::new("main.ink")).unwrap();
    assert_eq!(
        main.issues,
        vec![
            GraphIssue::MissingInclude {
                raw: "nope.ink".into()
            },
            GraphIssue::IncludeOutsideProject {
                raw: "../outside.ink".into()
            },
            GraphIssue::SelfInclude {
                raw: "main.ink".into()
            },
        ]
    );
    assert!(main.is_master());

    // Mutual includes are dropped on both sides, leaving two masters.
    let x = graph.file(Path::new("x.ink")).unwrap();
    let y = graph.file(Path::new("y.ink")).unwrap();
    assert!(x.includes.is_empty() && y.includes.is_empty());
    assert!(x.is_master() && y.is_master());
    assert_eq!(x.issues, vec![GraphIssue::MutualInclude { other: p("y.ink") }]);

    // A longer cycle has no master at all.
    let members = ps(&["loop/a.ink", "loop/b.ink", "loop/c.ink"]);
    for rel in ["loop/a.ink", "loop/b.ink", "loop/c.ink"] {
        let file = graph.file(Path::new(rel)).unwrap();
        assert!(file.is_invalid(), "{rel} should have no master");
        assert!(file.issues.contains(&GraphIssue::IncludeCycle {
            members: members.clone()
        }));
        assert!(file.issues.contains(&GraphIssue::NoMaster));
    }
    let masters: Vec<_> = graph.master_files().iter().map(|f| f.path.clone()).collect();
    assert_eq!(masters, ps(&["main.ink", "x.ink", "y.ink"]));
}

#[test]
fn refreshing_a_new_file_fixes_the_dangling_include() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write(&dir, "main.ink", "INCLUDE later.ink\n");
    let mut graph = build(&dir);
    assert_eq!(graph.file(Path::new("main.ink")).unwrap().issues.len(), 1);

    write(&dir, "later.ink", "Text.\n");
    let affected = graph.refresh_file(&RealFileSystem, Path::new("later.ink"));
    assert_eq!(affected, ps(&["main.ink"]));
    assert!(graph.file(Path::new("main.ink")).unwrap().issues.is_empty());
    assert!(!graph.file(Path::new("later.ink")).unwrap().is_master());

    fs::remove_file(dir.path().join("later.ink")).unwrap();
    let affected = graph.refresh_file(&RealFileSystem, Path::new("later.ink"));
    assert_eq!(affected, ps(&["main.ink"]));
    assert!(graph.file(Path::new("later.ink")).is_none());
    assert_eq!(graph.file(Path::new("main.ink")).unwrap().issues.len(), 1);
}

#[test]
fn rebuild_detects_files_changed_behind_its_back() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    story(&dir);
    let mut graph = build(&dir);

    fs::remove_file(dir.path().join("side.ink")).unwrap();
    assert!(graph.requires_rebuild(&RealFileSystem));

    graph.rebuild(&RealFileSystem).unwrap();
    assert!(!graph.requires_rebuild(&RealFileSystem));
    let vars = graph.file(Path::new("shared/vars.ink")).unwrap();
    assert_eq!(vars.masters.iter().cloned().collect::<Vec<_>>(), ps(&["main.ink"]));
}

#[test]
fn output_dir_and_excludes_come_from_options() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    story(&dir);
    write(&dir, "drafts/old.ink", "Old.\n");

    let mut options = GraphOptions::new("ink");
    options.output_dir = Some(p("build"));
    let mut exclude = globset::GlobSetBuilder::new();
    exclude.add(globset::Glob::new("drafts/**").unwrap());
    options.exclude = Some(exclude.build().unwrap());

    let graph = FileGraph::build(dir.path(), options, &RealFileSystem).unwrap();
    assert!(graph.file(Path::new("drafts/old.ink")).is_none());
    assert_eq!(
        graph.artifact_path(Path::new("chapters/one.ink")),
        p("build/chapters/one.json")
    );
}
