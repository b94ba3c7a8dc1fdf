//! Command-line entry point surface (spec §6 "CLI").
//!
//! `clap`'s derive macro gives us the `server [-e edition] [-p port] [-w
//! workers] [-t threads-per-worker] [-c config-path]` surface from spec.md.
//! One documented divergence from the original getopt-based loop: an
//! unrecognized flag is a hard parse error here rather than "logged and
//! ignored" — see DESIGN.md.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chatease-server", version, about = "WebSocket chat server")]
pub struct Cli {
  /// Build-time chat feature variant.
  #[arg(short = 'e', long = "edition")]
  pub edition: Option<String>,

  /// HTTP listen port.
  #[arg(short = 'p', long = "port")]
  pub port: Option<u16>,

  /// Number of worker processes.
  #[arg(short = 'w', long = "workers")]
  pub workers: Option<usize>,

  /// Tokio runtime threads per worker process.
  #[arg(short = 't', long = "threads")]
  pub threads: Option<usize>,

  /// Path to the configuration file.
  #[arg(short = 'c', long = "config")]
  pub config: Option<PathBuf>,

  /// Internal flag set when re-exec'd as a worker process; not part of the
  /// public CLI surface (spec §5's "master forks N workers").
  #[arg(long = "worker", hide = true)]
  pub worker: bool,
}

impl Cli {
  /// Applies CLI overrides on top of a loaded [`crate::config::Config`],
  /// mirroring `main()`'s `getopt` loop in `chatease-server.c`.
  pub fn apply(&self, cfg: &mut crate::config::Config) {
    if let Some(port) = self.port {
      cfg.listen = port;
    }
    if let Some(workers) = self.workers {
      cfg.worker_processes = workers;
    }
    if let Some(threads) = self.threads {
      cfg.worker_threads = threads;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn apply_overrides_config_fields() {
    let mut cfg = crate::config::Config::default();
    let cli = Cli::parse_from(["chatease-server", "-p", "1234", "-w", "3"]);
    cli.apply(&mut cfg);
    assert_eq!(cfg.listen, 1234);
    assert_eq!(cfg.worker_processes, 3);
  }
}
