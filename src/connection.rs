//! Connection lifecycle and the event-driven I/O model (spec §4.4, §4.5).
//!
//! The original's edge-triggered multiplexer + per-connection spinlock
//! becomes one Tokio task per connection (spec Design Notes §9): the task
//! itself is the event loop binding, and exclusive `&mut self` access to
//! the connection's state replaces the spinlock. See `src/ws/mod.rs` for
//! why the frame-header scratch buffer no longer needs the teacher's
//! thread-local hack.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::channel::SharedRegistry;
use crate::dispatch::Outcome;
use crate::http::{self, ParseOutcome};
use crate::pool::ConnPool;
use crate::user::{User, UserId};
use crate::ws::{Frame, OpCode, Payload, Role, WsError};

const REQUEST_BUFFER_SIZE: usize = 8 * 1024;
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Process-wide (per worker) shared state handed to every connection task.
pub struct ServerState {
  pub registry: SharedRegistry,
  pub server_header: String,
}

impl ServerState {
  pub fn new(server_header: impl Into<String>) -> Self {
    ServerState { registry: crate::channel::new_shared_registry(), server_header: server_header.into() }
  }
}

/// Accepts connections from `listener` until it errors, spawning one task
/// per connection (spec §4.5 "Connection manager": accept, allocate,
/// register read handler").
pub async fn accept_loop(listener: TcpListener, state: Arc<ServerState>) {
  loop {
    match listener.accept().await {
      Ok((stream, addr)) => {
        let state = state.clone();
        tokio::spawn(async move {
          if let Err(err) = serve(stream, addr, state).await {
            debug!(%addr, %err, "connection closed with error");
          }
        });
      }
      Err(err) => {
        error!(%err, "accept failed");
      }
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
  #[error(transparent)]
  Http(#[from] crate::error::HttpError),
  #[error(transparent)]
  Ws(#[from] WsError),
  #[error("idle timeout")]
  IdleTimeout,
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// Drives one connection end to end: read the HTTP request, handshake,
/// then the WebSocket frame loop (spec §2 "Data flow").
pub async fn serve(mut stream: TcpStream, addr: SocketAddr, state: Arc<ServerState>) -> Result<(), ServeError> {
  let mut pool = ConnPool::new(REQUEST_BUFFER_SIZE, REQUEST_BUFFER_SIZE * 4);
  pool.reserve(REQUEST_BUFFER_SIZE).ok();

  let request = match read_http_request(&mut stream, &mut pool).await {
    Ok(request) => request,
    Err(ServeError::Http(crate::error::HttpError::PeerClosed)) => {
      // Spec §8 S6: client closed mid-request — no response, no leak.
      return Ok(());
    }
    Err(ServeError::Http(http_err)) => {
      let response = http::build_error_response(http_err.status(), &state.server_header);
      let _ = tokio::io::AsyncWriteExt::write_all(&mut stream, &response).await;
      return Err(ServeError::Http(http_err));
    }
    Err(other) => return Err(other),
  };

  let response = http::build_response(&request, &state.server_header);
  tokio::io::AsyncWriteExt::write_all(&mut stream, &response).await?;

  if !request.is_valid_handshake() {
    return Ok(());
  }

  debug!(%addr, uri = %request.line.uri, "upgraded to websocket");

  let user_id = UserId::new(format!("{:x}", rolling_addr_id(addr))).unwrap_or_else(|| UserId::new("anon").unwrap());
  state.registry.write().await.insert_user(User::new(user_id.clone(), format!("guest-{addr}")));

  let mut ws = crate::ws::WebSocket::after_handshake(stream, Role::Server);
  let result = frame_loop(&mut ws, &state, &user_id).await;

  state.registry.write().await.remove_user(&user_id);
  result
}

fn rolling_addr_id(addr: SocketAddr) -> u64 {
  crate::headers::rolling_hash(addr.to_string().as_bytes())
}

/// Drives both directions of a joined connection: reads frames off the
/// socket and dispatches them, and forwards whatever the user's current
/// channel broadcasts back out as text frames (spec §1 "multiplexes chat
/// messages between users organized into channels").
async fn frame_loop<S>(ws: &mut crate::ws::WebSocket<S>, state: &Arc<ServerState>, user_id: &UserId) -> Result<(), ServeError>
where
  S: tokio::io::AsyncReadExt + tokio::io::AsyncWriteExt + Unpin,
{
  let mut channel_rx: Option<broadcast::Receiver<Arc<str>>> = None;

  loop {
    let recv_broadcast = async {
      match &mut channel_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
      }
    };

    tokio::select! {
      result = timeout(IDLE_READ_TIMEOUT, ws.read_frame()) => {
        let frame = match result {
          Ok(Ok(frame)) => frame,
          Ok(Err(WsError::ConnectionClosed)) => return Ok(()),
          Ok(Err(err)) => return Err(err.into()),
          Err(_) => return Err(ServeError::IdleTimeout),
        };

        match frame.opcode {
          OpCode::Close => return Ok(()),
          OpCode::Text => {
            let outcome = crate::dispatch::handle_message(&state.registry, user_id, frame.payload.as_slice()).await;
            match outcome {
              Outcome::Joined(channel_id) => {
                channel_rx = state.registry.read().await.channel(&channel_id).map(|c| c.subscribe());
              }
              Outcome::Ignored => {
                warn!(%user_id, "dropped unrecognized or rate-limited message");
              }
              Outcome::Broadcast => {}
            }
          }
          _ => {}
        }
      }
      message = recv_broadcast => {
        match message {
          Ok(text) => {
            ws.write_frame(Frame::text(Payload::Owned(text.as_bytes().to_vec()))).await?;
          }
          Err(broadcast::error::RecvError::Lagged(_)) => {
            warn!(%user_id, "broadcast receiver lagged, some messages were dropped");
          }
          Err(broadcast::error::RecvError::Closed) => {
            channel_rx = None;
          }
        }
      }
    }
  }
}

/// Reads from `stream` into `pool`'s scratch buffer until either a
/// complete request is parsed (spec §8.1: "consumes exactly up to and
/// including the terminating CRLF-CRLF") or the peer closes the connection
/// (spec §8 S6).
async fn read_http_request(stream: &mut TcpStream, pool: &mut ConnPool) -> Result<http::Request, ServeError> {
  loop {
    let mut chunk = [0u8; 512];
    let n = timeout(IDLE_READ_TIMEOUT, stream.read(&mut chunk)).await.map_err(|_| ServeError::IdleTimeout)??;
    if n == 0 {
      return Err(crate::error::HttpError::PeerClosed.into());
    }
    pool.reserve(n).map_err(|_| crate::error::HttpError::Internal)?;
    pool.scratch_mut().extend_from_slice(&chunk[..n]);

    match http::parse_request(pool.scratch_mut())? {
      ParseOutcome::Again => continue,
      ParseOutcome::Done { request, .. } => return Ok(request),
    }
  }
}
