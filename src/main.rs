//! CLI entry point (spec §6). Parses arguments, loads configuration,
//! writes the pidfile, binds the listener, and either runs as the master
//! (forking workers) or as a worker (serving connections) — mirroring
//! `chatease-server.c`'s `main()`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use chatease::cli::Cli;
use chatease::config::Config;
use chatease::connection::{accept_loop, ServerState};
use chatease::pidfile::Pidfile;
use chatease::supervisor::{self, SupervisorEvent};

fn main() -> ExitCode {
  let cli = Cli::parse();

  let mut cfg = match &cli.config {
    Some(path) => match Config::load(path) {
      Ok(cfg) => cfg,
      Err(err) => {
        eprintln!("Failed to parse configure file: {err}");
        return ExitCode::FAILURE;
      }
    },
    None => Config::default(),
  };
  cli.apply(&mut cfg);

  let _log_guard = chatease::logging::init(&cfg.log);
  info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

  if cli.worker {
    run_worker(cfg)
  } else {
    run_master(cfg, cli.config.as_deref())
  }
}

fn run_master(cfg: Config, config_path: Option<&std::path::Path>) -> ExitCode {
  let pidfile = match Pidfile::create(&cfg.pid, std::process::id()) {
    Ok(p) => p,
    Err(err) => {
      error!(%err, "Failed to create pid file");
      return ExitCode::FAILURE;
    }
  };

  let mut children = match supervisor::spawn_workers(&cfg, config_path) {
    Ok(children) => children,
    Err(err) => {
      error!(%err, "Failed to start worker processes");
      return ExitCode::FAILURE;
    }
  };

  let rt = match tokio::runtime::Runtime::new() {
    Ok(rt) => rt,
    Err(err) => {
      error!(%err, "Failed to init cycle");
      return ExitCode::FAILURE;
    }
  };

  let event = rt.block_on(supervisor::run_master_signal_loop(|ev| {
    info!(?ev, "supervisor event");
  }));

  for child in &mut children {
    let _ = child.kill();
  }
  drop(pidfile);

  match event {
    Ok(SupervisorEvent::GracefulShutdown) | Ok(SupervisorEvent::QuitCurrentConnections) => ExitCode::SUCCESS,
    Ok(_) => ExitCode::SUCCESS,
    Err(err) => {
      error!(%err, "signal loop failed");
      ExitCode::FAILURE
    }
  }
}

fn run_worker(cfg: Config) -> ExitCode {
  let mut builder = tokio::runtime::Builder::new_multi_thread();
  builder.enable_all();
  if cfg.worker_threads > 0 {
    builder.worker_threads(cfg.worker_threads);
  }
  let rt = match builder.build() {
    Ok(rt) => rt,
    Err(err) => {
      error!(%err, "Failed to init cycle");
      return ExitCode::FAILURE;
    }
  };

  rt.block_on(async move {
    let addr = format!("0.0.0.0:{}", cfg.listen).parse().expect("valid bind address");
    let listener = match supervisor::bind_reuseport(addr) {
      Ok(l) => l,
      Err(err) => {
        error!(%err, "Failed to add http listen");
        return ExitCode::FAILURE;
      }
    };

    let state = Arc::new(ServerState::new(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))));
    accept_loop(listener, state).await;
    ExitCode::SUCCESS
  })
}
