//! Error types for the HTTP handshake, JSON codec and connection pool.
//!
//! WebSocket framing errors live in [`crate::ws::WsError`]; these are the
//! errors that can occur above the framing layer.

use thiserror::Error;

/// Failure while processing an HTTP request up to (and including) the
/// upgrade handshake. The `u16` associated with each variant is the status
/// code that gets written to the wire (spec §4.6 error status mapping).
#[derive(Debug, Error)]
pub enum HttpError {
  #[error("malformed request line")]
  MalformedRequestLine,
  #[error("malformed header line")]
  MalformedHeaderLine,
  #[error("duplicate header: {0}")]
  DuplicateHeader(&'static str),
  #[error("header value too long")]
  HeaderTooLong,
  #[error("HTTP version not supported")]
  VersionNotSupported,
  #[error("Connection header missing the Upgrade token")]
  NotUpgrade,
  #[error("missing or invalid websocket handshake headers")]
  BadRequest,
  #[error("allocation failure while building request")]
  Internal,
  #[error("peer closed the connection")]
  PeerClosed,
}

impl HttpError {
  /// The status code this error maps onto, per spec §4.6/§7.
  pub fn status(&self) -> u16 {
    match self {
      HttpError::VersionNotSupported => 505,
      HttpError::NotUpgrade => 501,
      HttpError::Internal => 500,
      HttpError::PeerClosed => 0,
      _ => 400,
    }
  }
}

/// Failure while parsing or serializing a JSON value (spec §4.3).
#[derive(Debug, Error, PartialEq)]
pub enum JsonError {
  #[error("unexpected end of input at byte {0}")]
  UnexpectedEnd(usize),
  #[error("unterminated string starting near byte {0}")]
  UnterminatedString(usize),
  #[error("invalid escape sequence at byte {0}")]
  InvalidEscape(usize),
  #[error("expected '{expected}' at byte {pos}")]
  ExpectedToken { pos: usize, expected: char },
  #[error("invalid number at byte {0}")]
  InvalidNumber(usize),
  #[error("trailing data after value at byte {0}")]
  TrailingData(usize),
  #[error("nesting too deep at byte {0}")]
  TooDeep(usize),
}

/// Failure allocating scratch space from a connection's pool (spec §4.1).
#[derive(Debug, Error)]
pub enum PoolError {
  #[error("connection pool exhausted")]
  Exhausted,
}
