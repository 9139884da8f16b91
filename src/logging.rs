use crate::models::error::SError;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "save_keeper.log";

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Installs a daily rolling file logger under `log_dir`.
///
/// `RUST_LOG` overrides the level chosen by `debug`. The returned guard must
/// be held for as long as logs should be flushed.
pub fn init_logging(log_dir: &Path, debug: bool) -> Result<WorkerGuard, SError> {
    std::fs::create_dir_all(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_PREFIX));

    tracing_subscriber::registry()
        .with(default_filter(debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .try_init()
        .map_err(|e| SError::IOError(format!("logging already initialized: {e}")))?;

    tracing::info!("logging to {}", log_dir.display());
    Ok(guard)
}

/// Stderr-only logging for tools and tests. Does nothing if a subscriber is
/// already installed.
pub fn init_console_logging(debug: bool) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(debug))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
