//! Integration tests for the HTTP upgrade handshake, driven against a real
//! loopback listener (spec §8 scenarios S1-S6).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chatease::connection::{accept_loop, ServerState};

async fn spawn_server() -> std::net::SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let state = Arc::new(ServerState::new("chatease-server/test"));
  tokio::spawn(accept_loop(listener, state));
  addr
}

async fn read_response(stream: &mut TcpStream) -> String {
  let mut buf = Vec::new();
  let mut chunk = [0u8; 512];
  loop {
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut chunk)).await.unwrap().unwrap();
    if n == 0 {
      break;
    }
    buf.extend_from_slice(&chunk[..n]);
    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
      break;
    }
  }
  String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn s1_happy_handshake_returns_101() {
  let addr = spawn_server().await;
  let mut stream = TcpStream::connect(addr).await.unwrap();
  stream
    .write_all(
      b"GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
    )
    .await
    .unwrap();

  let response = read_response(&mut stream).await;
  assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"), "got: {response}");
  assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
}

#[tokio::test]
async fn s2_missing_upgrade_header_returns_400() {
  let addr = spawn_server().await;
  let mut stream = TcpStream::connect(addr).await.unwrap();
  stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

  let response = read_response(&mut stream).await;
  assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {response}");
}

#[tokio::test]
async fn s3_wrong_connection_token_is_rejected() {
  let addr = spawn_server().await;
  let mut stream = TcpStream::connect(addr).await.unwrap();
  stream
    .write_all(b"GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: keep-alive\r\n\r\n")
    .await
    .unwrap();

  let response = read_response(&mut stream).await;
  assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"), "got: {response}");
}

#[tokio::test]
async fn s4_duplicate_host_header_is_bad_request() {
  let addr = spawn_server().await;
  let mut stream = TcpStream::connect(addr).await.unwrap();
  stream.write_all(b"GET / HTTP/1.1\r\nHost: a\r\nHost: b\r\n\r\n").await.unwrap();

  let response = read_response(&mut stream).await;
  assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {response}");
}

#[tokio::test]
async fn s6_peer_close_mid_request_gets_no_response() {
  let addr = spawn_server().await;
  let mut stream = TcpStream::connect(addr).await.unwrap();
  stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
  stream.shutdown().await.unwrap();
  drop(stream);

  // Reconnecting confirms the listener is still healthy and leaked no
  // resources from the aborted connection above.
  let mut probe = TcpStream::connect(addr).await.unwrap();
  probe.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
  let response = read_response(&mut probe).await;
  assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {response}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "concurrency soak test, run explicitly with --ignored"]
async fn handles_many_concurrent_handshakes() {
  let addr = spawn_server().await;
  let mut handles = Vec::new();
  for _ in 0..1024 {
    handles.push(tokio::spawn(async move {
      let mut stream = TcpStream::connect(addr).await.unwrap();
      stream
        .write_all(
          b"GET /chat HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
        )
        .await
        .unwrap();
      let response = read_response(&mut stream).await;
      assert!(response.starts_with("HTTP/1.1 101"));
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }
}
