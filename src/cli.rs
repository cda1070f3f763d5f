// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `inkwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "inkwatch",
    version,
    about = "Keep compiled story JSON in sync with ink source files.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means all defaults.
    #[arg(long, value_name = "PATH", default_value = "Inkwatch.toml")]
    pub config: String,

    /// Compile stale masters once and exit; no watching.
    #[arg(long)]
    pub once: bool,

    /// Compile every master, not only stale ones (includes manual-only
    /// masters).
    #[arg(long)]
    pub force: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INKWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the include graph and what would be compiled, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::parse_from(["inkwatch"]);
        assert_eq!(args.config, "Inkwatch.toml");
        assert!(!args.once && !args.force && !args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn flags() {
        let args = CliArgs::parse_from([
            "inkwatch",
            "--config",
            "story/Inkwatch.toml",
            "--once",
            "--force",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.config, "story/Inkwatch.toml");
        assert!(args.once && args.force);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
