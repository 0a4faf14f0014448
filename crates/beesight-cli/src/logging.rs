//! Logging setup: stderr plus an append-only diagnostic log file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use beesight_core::storage::default_log_path;
use beesight_core::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const STDERR_FILTER: &str = "beesight=info,beesight_core=info";
const FILE_FILTER: &str = "beesight=debug,beesight_core=debug";

/// `[logging] file` from the config if it loads, else the data-dir default.
pub fn log_file_for(config_path: &Path) -> Option<PathBuf> {
    Config::load_from(config_path)
        .ok()
        .and_then(|c| c.logging.file)
        .map(PathBuf::from)
        .or_else(|| default_log_path().ok())
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // use RUST_LOG env var, default to info for beesight crates.
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(STDERR_FILTER));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("warning: cannot open log file {}: {e}", path.display());
                None
            }
        }
    });

    let (file_layer, guard) = match file {
        Some(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
