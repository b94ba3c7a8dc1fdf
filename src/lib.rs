// Copyright 2023 chatease contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! _chatease_ is a small, fast WebSocket chat server.
//!
//! It accepts many concurrent HTTP/1.1 connections, performs the RFC 6455
//! upgrade handshake, then multiplexes JSON chat messages between users
//! organized into channels.
//!
//! # Example
//!
//! ```no_run
//! use tokio::net::TcpStream;
//! use chatease::ws::{WebSocket, OpCode, Role};
//! use anyhow::Result;
//!
//! async fn handle(socket: TcpStream) -> Result<()> {
//!   let mut ws = WebSocket::after_handshake(socket, Role::Server);
//!   loop {
//!     let frame = ws.read_frame().await?;
//!     match frame.opcode {
//!       OpCode::Close => break,
//!       OpCode::Text => {
//!         ws.write_frame(frame).await?;
//!       }
//!       _ => {}
//!     }
//!   }
//!   Ok(())
//! }
//! ```

pub mod buffer;
pub mod channel;
pub mod cli;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod http;
pub mod json;
pub mod logging;
pub mod pidfile;
pub mod pool;
pub mod supervisor;
pub mod user;
pub mod ws;

pub use crate::error::{HttpError, JsonError, PoolError};
