// src/main.rs

use inkwatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("inkwatch error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// Ok(false) when a `--once` batch ended with errors.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
