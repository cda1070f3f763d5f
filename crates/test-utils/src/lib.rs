pub mod builders;
pub mod fake_compiler;
pub mod recording_host;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{ConfigFileBuilder, TestProject, TestProjectBuilder, ROOT};
pub use fake_compiler::{Script, ScriptedCompiler};
pub use recording_host::{HostEvent, RecordingHost};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs are captured per test and only printed for failing tests (unless
/// run with `-- --nocapture`). Filter with `RUST_LOG`, e.g.
/// `RUST_LOG=inkwatch=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
