//! Master/worker process supervisor (spec §5 "Scheduling model", §6
//! "Signals"). Treated as an external collaborator per spec §1 — only the
//! interface and the observable behavior (shared listening socket, signal
//! handling, pidfile lifecycle) are implemented; chat routing logic never
//! lives here.
//!
//! The shared listening socket is realized with `SO_REUSEPORT`: each worker
//! process binds its own socket on the same port, and the kernel load-
//! balances accepted connections across them — a standard alternative to
//! literal fd-inheritance-after-fork that avoids re-exec/fd-passing
//! plumbing (documented in DESIGN.md as the chosen resolution for this
//! component).

use std::io;
use std::net::SocketAddr;
use std::process::{Child, Command};

use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Config;

/// Binds a `SO_REUSEPORT` listener on `addr`, to be called once per worker
/// process (each worker calls this independently; the kernel fans out
/// `accept()` between them — spec §5a "kernel serializes accept").
pub fn bind_reuseport(addr: SocketAddr) -> io::Result<TcpListener> {
  let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
  socket.set_reuse_address(true)?;
  socket.set_reuse_port(true)?;
  socket.set_nonblocking(true)?;
  socket.bind(&addr.into())?;
  socket.listen(1024)?;
  TcpListener::from_std(socket.into())
}

/// Spawns `cfg.worker_processes` copies of the current executable with
/// `--worker`, passing through the same config path so each worker parses
/// its own copy of the configuration (spec §5: "master forks N worker
/// processes that share the listening socket").
pub fn spawn_workers(cfg: &Config, config_path: Option<&std::path::Path>) -> io::Result<Vec<Child>> {
  let exe = std::env::current_exe()?;
  let mut children = Vec::with_capacity(cfg.worker_processes);
  for _ in 0..cfg.worker_processes.max(1) {
    let mut cmd = Command::new(&exe);
    cmd.arg("--worker");
    cmd.arg("-p").arg(cfg.listen.to_string());
    cmd.arg("-t").arg(cfg.worker_threads.to_string());
    if let Some(path) = config_path {
      cmd.arg("-c").arg(path);
    }
    children.push(cmd.spawn()?);
  }
  Ok(children)
}

/// What the master's signal loop decided to do, surfaced for logging and
/// for tests that don't want to actually block on real signals.
#[derive(Debug, PartialEq, Eq)]
pub enum SupervisorEvent {
  GracefulShutdown,
  ReopenLogs,
  ReapWorkers,
  QuitCurrentConnections,
}

/// Runs the master's signal-handling loop until a terminating signal
/// arrives, returning which one (spec §6 "Signals"). `TERM`/`INT` and
/// `QUIT` both end the loop; `HUP`/`USR1`/`CHLD` are handled and the loop
/// continues.
pub async fn run_master_signal_loop(on_event: impl Fn(SupervisorEvent)) -> io::Result<SupervisorEvent> {
  let mut term = signal(SignalKind::terminate())?;
  let mut int = signal(SignalKind::interrupt())?;
  let mut quit = signal(SignalKind::quit())?;
  let mut hup = signal(SignalKind::hangup())?;
  let mut usr1 = signal(SignalKind::user_defined1())?;
  let mut chld = signal(SignalKind::from_raw(libc_sigchld()))?;

  loop {
    tokio::select! {
      _ = term.recv() => { on_event(SupervisorEvent::GracefulShutdown); return Ok(SupervisorEvent::GracefulShutdown); }
      _ = int.recv() => { on_event(SupervisorEvent::GracefulShutdown); return Ok(SupervisorEvent::GracefulShutdown); }
      _ = quit.recv() => { on_event(SupervisorEvent::QuitCurrentConnections); return Ok(SupervisorEvent::QuitCurrentConnections); }
      _ = hup.recv() => { on_event(SupervisorEvent::ReopenLogs); }
      _ = usr1.recv() => { on_event(SupervisorEvent::ReopenLogs); }
      _ = chld.recv() => { on_event(SupervisorEvent::ReapWorkers); }
    }
  }
}

fn libc_sigchld() -> i32 {
  // SIGCHLD's numeric value is stable across the Unix targets this crate
  // supports; avoided pulling in `libc` for a single constant.
  17
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn bind_reuseport_succeeds_on_loopback() {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = bind_reuseport(addr);
    assert!(listener.is_ok());
  }

  #[tokio::test]
  async fn two_workers_can_share_the_same_port() {
    let first = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
    let port = first.local_addr().unwrap().port();
    let second = bind_reuseport(format!("127.0.0.1:{port}").parse().unwrap());
    assert!(second.is_ok(), "SO_REUSEPORT should allow a second bind to the same port");
  }
}
