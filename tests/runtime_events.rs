// tests/runtime_events.rs

mod common;
use crate::common::{
    init_tracing, p, ps, story_project, with_timeout, HostEvent, RecordingHost, Script,
};

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;

use inkwatch::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use inkwatch::types::HostMode;

type TestResult = Result<(), Box<dyn Error>>;

fn options(exit_when_idle: bool) -> RuntimeOptions {
    RuntimeOptions {
        poll_interval: Duration::from_millis(5),
        exit_when_idle,
    }
}

async fn wait_for_batches(host: &RecordingHost, count: usize) {
    while host.completed_batches().len() < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn once_mode_exits_after_the_startup_batch() -> TestResult {
    init_tracing();
    let mut project = story_project().build();
    project.orchestrator.compile_all(false)?;

    let (_tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let runtime = Runtime::new(project.orchestrator, rx, options(true));

    let summary = with_timeout(runtime.run()).await?.expect("one batch drained");
    assert_eq!(summary.compiled, ps(&["main.ink", "side.ink"]));
    assert!(!summary.has_errors);
    assert!(project.fs.contents("/proj/main.json").is_some());
    Ok(())
}

#[tokio::test]
async fn idle_once_run_exits_without_a_batch() -> TestResult {
    init_tracing();
    let project = story_project().build();

    let (_tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let runtime = Runtime::new(project.orchestrator, rx, options(true));

    assert!(with_timeout(runtime.run()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn events_drive_the_orchestrator_until_shutdown() -> TestResult {
    init_tracing();
    let project = story_project().build();
    let host = project.host.clone();
    let fs = project.fs.clone();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let runtime = Runtime::new(project.orchestrator, rx, options(false));
    let handle = tokio::spawn(runtime.run());

    tx.send(RuntimeEvent::CompileRequested {
        path: p("chapters/one.ink"),
        immediate: false,
    })
    .await?;
    with_timeout(wait_for_batches(&host, 1)).await;
    assert_eq!(host.completed_batches()[0].compiled, ps(&["main.ink"]));

    // Parked while restricted, compiled on return to editing.
    tx.send(RuntimeEvent::EnterRestrictedModeRequested).await?;
    fs.add_file("/proj/side.ink", "INCLUDE shared/vars.ink\nRevised.\n");
    tx.send(RuntimeEvent::SourceChanged { path: p("side.ink") })
        .await?;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(host.completed_batches().len(), 1);

    tx.send(RuntimeEvent::HostModeChanged(HostMode::Editing))
        .await?;
    with_timeout(wait_for_batches(&host, 2)).await;
    assert_eq!(host.completed_batches()[1].compiled, ps(&["side.ink"]));

    tx.send(RuntimeEvent::RecompileAll { force: true }).await?;
    with_timeout(wait_for_batches(&host, 3)).await;
    assert_eq!(
        host.completed_batches()[2].compiled,
        ps(&["main.ink", "side.ink"])
    );

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let last = with_timeout(handle).await??;
    assert_eq!(last.map(|s| s.compiled.len()), Some(2));
    assert_eq!(host.count(&HostEvent::EnterRestricted), 0);
    Ok(())
}

#[tokio::test]
async fn closing_the_channel_stops_the_runtime() -> TestResult {
    init_tracing();
    let project = story_project().build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let runtime = Runtime::new(project.orchestrator, rx, options(false));
    drop(tx);

    assert!(with_timeout(runtime.run()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn immediate_requests_leave_the_event_loop_responsive() -> TestResult {
    init_tracing();
    let project = story_project().build();
    let host = project.host.clone();
    let compiler = project.compiler.clone();
    compiler.script("side.ink", Script::Hang { lines: vec![] });

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(8);
    let runtime = Runtime::new(project.orchestrator, rx, options(false));
    let handle = tokio::spawn(runtime.run());

    tx.send(RuntimeEvent::CompileRequested {
        path: p("side.ink"),
        immediate: true,
    })
    .await?;

    // This runs on the same single-threaded executor as the runtime, so it
    // only gets here if the blocking compile happens elsewhere.
    with_timeout(async {
        while compiler.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(host.completed_batches().is_empty());

    compiler.release_all();
    with_timeout(wait_for_batches(&host, 1)).await;
    assert_eq!(host.completed_batches()[0].compiled, ps(&["side.ink"]));

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    with_timeout(handle).await??;
    Ok(())
}
