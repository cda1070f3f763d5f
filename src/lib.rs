// src/lib.rs

pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod host;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::compiler::CommandCompiler;
use crate::config::loader::load_or_default;
use crate::config::model::ConfigFile;
use crate::engine::{CompileOrchestrator, Runtime, RuntimeEvent, RuntimeOptions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::FileGraph;
use crate::host::LoggingHost;

/// High-level entry point used by `main.rs`.
///
/// This wires together config loading, the file graph, the orchestrator with
/// the external compiler, the watcher (unless `--once`) and Ctrl-C handling.
///
/// Returns `Ok(false)` when a `--once` run ended with errors.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let root = fs.canonicalize(&cfg.root_dir(&config_root_dir(&config_path)))?;
    let graph = FileGraph::build(&root, cfg.graph_options(), fs.as_ref())?;

    if args.dry_run {
        print_dry_run(&cfg, &graph, fs.as_ref());
        return Ok(true);
    }

    let compiler = Arc::new(CommandCompiler::new(
        cfg.compile.command.clone(),
        cfg.compile.args.clone(),
        cfg.scratch_dir(&root),
    ));
    let mut orchestrator = CompileOrchestrator::new(
        graph,
        Arc::clone(&fs),
        compiler,
        Box::new(LoggingHost),
        cfg.orchestrator_options(&root),
    );

    let restored = orchestrator.load_and_restore()?;
    if !restored.is_empty() {
        info!(jobs = restored.len(), "resumed work from previous run");
    }

    if args.once || args.force || cfg.compile.compile_on_startup {
        let queued = orchestrator.compile_all(args.force)?;
        info!(queued = queued.len(), force = args.force, "startup compile");
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let _watcher_handle = if !args.once {
        Some(crate::watch::spawn_watcher(
            &root,
            cfg.graph_options(),
            rt_tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        poll_interval: cfg.poll_interval(),
        exit_when_idle: args.once,
    };
    let last_batch = Runtime::new(orchestrator, rt_rx, options).run().await?;

    Ok(!args.once || last_batch.is_none_or(|summary| !summary.has_errors))
}

/// Directory holding the config file, or the working directory for a bare
/// file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the include graph without compiling anything.
fn print_dry_run(cfg: &ConfigFile, graph: &FileGraph, fs: &dyn FileSystem) {
    println!("inkwatch dry-run");
    println!("  root = {}", graph.root().display());
    println!(
        "  compiler = {} {}",
        cfg.compile.command,
        cfg.compile.args.join(" ")
    );
    println!("  timeout = {:?}", cfg.timeout());
    println!();

    let stale = graph.files_requiring_recompile(fs);
    let masters = graph.master_files();
    println!("masters ({}):", masters.len());
    for master in masters {
        let status = if stale.contains(&master.path) {
            "needs compile"
        } else {
            "up to date"
        };
        println!("  - {} [{status}]", master.path.display());
        println!(
            "      artifact: {}",
            graph.artifact_path(&master.path).display()
        );
        for path in graph.family_of(&master.path).iter().skip(1) {
            println!("      includes: {}", path.display());
        }
    }

    let troubled: Vec<_> = graph.files().filter(|f| !f.issues.is_empty()).collect();
    if !troubled.is_empty() {
        println!();
        println!("structural issues ({}):", troubled.len());
        for file in troubled {
            for issue in &file.issues {
                println!("  - {}: {issue}", file.path.display());
            }
        }
    }

    debug!("dry-run complete (no compilation)");
}
