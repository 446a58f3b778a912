//! Process-wide logging setup. The "log database" from the persisted-state
//! schema is modeled as an append-only rolling file sink under
//! `log_db_path`, tagged with this process's pid — safe to open from the
//! node, miner, and wallet binaries concurrently.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Must be kept alive for the process lifetime — dropping it stops the
/// background flush thread.
pub fn init_tracing(log_db_path: &str, log_level: &str) -> WorkerGuard {
    std::fs::create_dir_all(log_db_path).ok();
    let file_appender = tracing_appender::rolling::daily(log_db_path, "node.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    tracing::info!(pid = std::process::id(), "logging initialized");
    guard
}
