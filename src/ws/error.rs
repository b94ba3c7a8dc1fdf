//! WebSocket framing errors (generalized from the teacher's
//! `fastwebsockets::WebSocketError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid opcode: {0}")]
  InvalidOpcode(u8),
  #[error("reserved bits must be zero")]
  ReservedBitsNotZero,
  #[error("control frames must not be fragmented")]
  ControlFrameFragmented,
  #[error("ping frame payload too large")]
  PingFrameTooLarge,
  #[error("frame exceeds the configured maximum message size")]
  FrameTooLarge,
  #[error("invalid utf-8 in text frame")]
  InvalidUtf8,
  #[error("invalid close frame")]
  InvalidCloseFrame,
  #[error("invalid close code")]
  InvalidCloseCode,
  #[error("connection already closed")]
  ConnectionClosed,
  #[error("unexpected end of stream")]
  UnexpectedEof,
  #[error("decompression failed")]
  InvalidEncoding,
}
