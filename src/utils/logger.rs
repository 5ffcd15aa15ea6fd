//! Diagnostics logging.
//!
//! Diagnostics go to a file so they never draw over the TUI, one file per run:
//! `<data dir>/remote-pilot/logs/remote-pilot.2024-12-06-14-30-25.log`
//! (falling back to `./logs/` when no data directory is known).
//!
//! This is separate from the audit log: the audit log is the record of what
//! crossed the wire, these logs are for debugging the program itself.
//!
//! The level is controlled by `RUST_LOG` and defaults to `info`.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("remote-pilot").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Initialize file logging.
///
/// The returned guard flushes buffered records when dropped; keep it alive
/// for the whole run. Returns `None` if the log file could not be created,
/// in which case the program runs without diagnostics.
pub fn init_logging() -> Option<WorkerGuard> {
    let dir = log_dir();
    if let Err(e) = fs::create_dir_all(&dir) {
        eprintln!("Warning: Failed to create log directory {}: {}", dir.display(), e);
        return None;
    }

    let filename = format!("remote-pilot.{}.log", Local::now().format("%Y-%m-%d-%H-%M-%S"));
    let path = dir.join(filename);
    let file = match fs::File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file {}: {}", path.display(), e);
            return None;
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: a global tracing subscriber is already installed");
        return None;
    }

    tracing::info!("Logging initialized - writing to {}", path.display());
    Some(guard)
}
