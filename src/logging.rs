//! Log setup (spec §6 "log" config key; external collaborator, specified
//! here as the idiomatic `tracing` equivalent of the original's leveled
//! file logger, `stu_log_init`).

use std::fs::OpenOptions;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Initializes the global `tracing` subscriber, writing to `log.path` if one
/// is configured and openable, falling back to stdout otherwise. Safe to
/// call once per process; a second call is a no-op (another subscriber is
/// already installed, e.g. under `cargo test`).
///
/// The returned [`WorkerGuard`] flushes the non-blocking file writer on
/// drop — callers must hold onto it for the process's lifetime.
pub fn init(log: &LogConfig) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.as_tracing_filter()));

  if let Some(path) = &log.path {
    match OpenOptions::new().create(true).append(true).open(path) {
      Ok(file) => {
        let (writer, guard) = tracing_appender::non_blocking(file);
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_ansi(false).with_writer(writer).try_init();
        return Some(guard);
      }
      Err(err) => {
        eprintln!("failed to open log file {}: {err}, falling back to stdout", path.display());
      }
    }
  }

  let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
  None
}
