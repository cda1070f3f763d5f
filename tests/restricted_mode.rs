// tests/restricted_mode.rs

mod common;
use crate::common::{init_tracing, lines, ps, story_project, HostEvent, Script, DRAIN_LIMIT};

use std::path::Path;
use std::time::Instant;

use inkwatch::types::{HostMode, ModeTransition};

#[test]
fn entering_restricted_mode_while_idle_is_allowed() {
    init_tracing();
    let mut project = story_project().build();

    assert_eq!(
        project.orchestrator.try_enter_restricted_mode(),
        ModeTransition::Allowed
    );
    assert_eq!(project.orchestrator.mode(), HostMode::Restricted);
    assert_eq!(project.host.count(&HostEvent::Deferred), 0);
}

#[test]
fn changes_in_restricted_mode_wait_for_editing() {
    init_tracing();
    let mut project = story_project().build();
    project.orchestrator.try_enter_restricted_mode();

    project.edit("shared/vars.ink", "VAR gold = 3\n");
    assert!(!project.orchestrator.is_busy());
    assert_eq!(
        project.orchestrator.pending().iter().cloned().collect::<Vec<_>>(),
        ps(&["main.ink", "side.ink"])
    );

    // Parked changes don't pile up duplicates.
    project.edit("shared/vars.ink", "VAR gold = 4\n");
    assert_eq!(project.orchestrator.pending().len(), 2);

    project.orchestrator.exit_restricted_mode(Instant::now());
    assert!(project.orchestrator.pending().is_empty());
    let summary = project.run_until_drained(DRAIN_LIMIT).unwrap();
    assert_eq!(summary.compiled, ps(&["main.ink", "side.ink"]));
}

#[test]
fn host_reported_mode_changes_gate_compile_all() {
    init_tracing();
    let mut project = story_project().build();

    project
        .orchestrator
        .set_mode(HostMode::Restricted, Instant::now());
    assert!(project.orchestrator.compile_all(true).unwrap().is_empty());
    assert_eq!(project.orchestrator.pending().len(), 2);

    project
        .orchestrator
        .set_mode(HostMode::Editing, Instant::now());
    assert_eq!(project.orchestrator.jobs().len(), 2);
    project.run_until_drained(DRAIN_LIMIT).unwrap();
}

#[test]
fn deferred_entry_is_replayed_exactly_once_after_a_clean_batch() {
    init_tracing();
    let mut project = story_project().build();
    project
        .compiler
        .script("main.ink", Script::Hang { lines: vec![] });

    project
        .orchestrator
        .enqueue(Path::new("main.ink"), false)
        .unwrap();

    assert_eq!(
        project.orchestrator.try_enter_restricted_mode(),
        ModeTransition::Deferred
    );
    assert_eq!(
        project.orchestrator.try_enter_restricted_mode(),
        ModeTransition::Deferred
    );
    assert!(project.orchestrator.has_deferred_mode_entry());
    assert_eq!(project.orchestrator.mode(), HostMode::Editing);
    assert_eq!(project.host.count(&HostEvent::Deferred), 2);

    project.compiler.release_all();
    let summary = project.run_until_drained(DRAIN_LIMIT).unwrap();
    assert!(!summary.has_errors);

    assert_eq!(project.orchestrator.mode(), HostMode::Restricted);
    assert!(!project.orchestrator.has_deferred_mode_entry());
    assert_eq!(project.host.count(&HostEvent::EnterRestricted), 1);

    // Further ticks don't replay it again.
    for _ in 0..3 {
        project.orchestrator.poll();
    }
    assert_eq!(project.host.count(&HostEvent::EnterRestricted), 1);

    // The replay comes after the completion event.
    let events = project.host.events();
    let completed = events
        .iter()
        .position(|e| matches!(e, HostEvent::StackCompleted(_)))
        .unwrap();
    let entered = events
        .iter()
        .position(|e| *e == HostEvent::EnterRestricted)
        .unwrap();
    assert!(completed < entered);
}

#[test]
fn deferred_entry_is_dropped_when_the_batch_has_errors() {
    init_tracing();
    let mut project = story_project().build();
    project.compiler.script(
        "main.ink",
        Script::Reject {
            lines: lines(&["ERROR: 'main.ink' line 1: Unexpected token"]),
        },
    );

    project
        .orchestrator
        .enqueue(Path::new("main.ink"), false)
        .unwrap();
    assert_eq!(
        project.orchestrator.try_enter_restricted_mode(),
        ModeTransition::Deferred
    );

    let summary = project.run_until_drained(DRAIN_LIMIT).unwrap();
    assert!(summary.has_errors);
    assert_eq!(project.orchestrator.mode(), HostMode::Editing);
    assert!(!project.orchestrator.has_deferred_mode_entry());
    assert_eq!(project.host.count(&HostEvent::EnterRestricted), 0);

    // Nothing is left to replay on a later clean batch either.
    project.compiler.script(
        "main.ink",
        Script::Succeed {
            lines: vec![],
            artifact: b"{}".to_vec(),
        },
    );
    project
        .orchestrator
        .enqueue(Path::new("main.ink"), false)
        .unwrap();
    project.run_until_drained(DRAIN_LIMIT).unwrap();
    assert_eq!(project.host.count(&HostEvent::EnterRestricted), 0);
}

#[test]
fn cancelling_drops_a_deferred_entry() {
    init_tracing();
    let mut project = story_project().build();
    project
        .compiler
        .script("main.ink", Script::Hang { lines: vec![] });

    project
        .orchestrator
        .enqueue(Path::new("main.ink"), false)
        .unwrap();
    project.orchestrator.try_enter_restricted_mode();
    project.orchestrator.cancel_all();

    assert!(!project.orchestrator.has_deferred_mode_entry());
    assert_eq!(
        project.orchestrator.try_enter_restricted_mode(),
        ModeTransition::Allowed
    );
    assert_eq!(project.host.count(&HostEvent::EnterRestricted), 0);
}

#[test]
fn explicit_compile_requests_are_parked_in_restricted_mode() {
    init_tracing();
    let mut project = story_project().build();
    project
        .orchestrator
        .set_mode(HostMode::Restricted, Instant::now());

    let ids = project
        .orchestrator
        .compile_file(Path::new("shared/vars.ink"), false)
        .unwrap();
    assert!(ids.is_empty());
    assert!(!project.orchestrator.is_busy());
    assert!(!project.orchestrator.is_compiling());
    assert!(project.compiler.calls().is_empty());
    assert_eq!(
        project.orchestrator.pending().iter().cloned().collect::<Vec<_>>(),
        ps(&["main.ink", "side.ink"])
    );

    // Immediate requests wait too.
    let ids = project
        .orchestrator
        .compile_file(Path::new("main.ink"), true)
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(project.orchestrator.pending().len(), 2);
    assert!(project.compiler.calls().is_empty());

    project
        .orchestrator
        .set_mode(HostMode::Editing, Instant::now());
    let summary = project.run_until_drained(DRAIN_LIMIT).unwrap();
    assert_eq!(summary.compiled, ps(&["main.ink", "side.ink"]));
    assert!(project.orchestrator.pending().is_empty());
}
