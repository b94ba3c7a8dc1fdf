//! HTTP/1.1 request parser and WebSocket handshake (spec §4.6).
//!
//! Grounded directly on `stu_http_parse_request_line` /
//! `stu_http_parse_header_line` / `stu_http_process_request_headers` in
//! `stu_http_request.c`: an explicit state machine over the request-line and
//! header-line grammar, dispatching each parsed header through the static
//! table in [`crate::headers`]. Unlike the teacher crate's `upgrade` module
//! (which leans on `hyper`'s request parser), this one is hand-written: the
//! testable invariants in spec §8.1/§8.2 are about this exact state machine.

use base64::Engine;
use sha1::{Digest, Sha1};

use crate::buffer::{ByteStr, Cursor};
use crate::error::HttpError;
use crate::headers::{rolling_hash, HeaderEntry, HeaderKind, HeaderTable};

const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Method/URI/version recognized on the request line (spec §4.6).
#[derive(Debug)]
pub struct RequestLine {
  pub method: String,
  pub uri: String,
  pub version_minor: u8,
}

/// A fully parsed HTTP request, up to and including the terminating blank
/// line. Holds inbound headers and the (possibly empty) outbound headers
/// produced while dispatching them — today just `Sec-WebSocket-Accept`.
#[derive(Debug)]
pub struct Request {
  pub line: RequestLine,
  pub inbound: HeaderTable,
  pub sec_websocket_accept: Option<String>,
  pub connection_is_upgrade: bool,
  pub upgrade_is_websocket: bool,
  pub sec_websocket_version_13: bool,
  pub sec_websocket_key_valid: bool,
}

/// Outcome of trying to parse a request out of a (possibly partial) buffer.
pub enum ParseOutcome {
  /// Not enough bytes yet; caller should read more and retry.
  Again,
  /// A complete request was parsed; `consumed` is the number of bytes up to
  /// and including the terminating CRLFCRLF (spec §8.1).
  Done { request: Request, consumed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
  Method,
  Uri,
  Version,
}

/// Parses the request line + headers out of `buf`. Mirrors
/// `stu_http_process_request_headers`'s loop over `{OK, AGAIN, DONE,
/// ERROR}`, collapsed into a `Result<ParseOutcome, HttpError>` since we
/// always have the whole buffer read so far in memory.
pub fn parse_request(buf: &[u8]) -> Result<ParseOutcome, HttpError> {
  let mut cursor = Cursor::new(buf);

  let line = match parse_request_line(&mut cursor)? {
    Some(line) => line,
    None => return Ok(ParseOutcome::Again),
  };

  let mut inbound = HeaderTable::new();
  let mut lower_scratch = Vec::new();

  loop {
    match parse_header_line(&mut cursor, &mut lower_scratch)? {
      HeaderLineOutcome::Again => return Ok(ParseOutcome::Again),
      HeaderLineOutcome::Done => break,
      HeaderLineOutcome::Header(entry) => {
        check_duplicate(&inbound, &entry)?;
        inbound.push(entry);
      }
    }
  }

  let consumed = cursor.pos();
  let request = finish_request(line, inbound)?;
  Ok(ParseOutcome::Done { request, consumed })
}

fn parse_request_line(cursor: &mut Cursor) -> Result<Option<RequestLine>, HttpError> {
  let start = cursor.pos();
  let Some(line_end) = find_crlf(cursor.remaining()) else {
    return Ok(None);
  };
  let line = cursor.slice(start, start + line_end);
  cursor.advance(line_end + 2);

  let mut state = LineState::Method;
  let mut method_end = 0;
  let mut uri_start = 0;
  let mut uri_end = 0;
  let mut version_start = 0;

  for (i, &b) in line.iter().enumerate() {
    match state {
      LineState::Method if b == b' ' => {
        method_end = i;
        uri_start = i + 1;
        state = LineState::Uri;
      }
      LineState::Uri if b == b' ' => {
        uri_end = i;
        version_start = i + 1;
        state = LineState::Version;
      }
      _ => {}
    }
  }
  if state != LineState::Version || version_start >= line.len() {
    return Err(HttpError::MalformedRequestLine);
  }

  let method = std::str::from_utf8(&line[..method_end]).map_err(|_| HttpError::MalformedRequestLine)?;
  let uri = std::str::from_utf8(&line[uri_start..uri_end]).map_err(|_| HttpError::MalformedRequestLine)?;
  let version = &line[version_start..];

  if method != "GET" {
    return Err(HttpError::MalformedRequestLine);
  }

  if !version.starts_with(b"HTTP/1.") || version.len() != 8 {
    return Err(HttpError::MalformedRequestLine);
  }
  let minor = version[7];
  if !minor.is_ascii_digit() {
    return Err(HttpError::MalformedRequestLine);
  }
  let minor = minor - b'0';
  if minor < 1 {
    return Err(HttpError::VersionNotSupported);
  }

  Ok(Some(RequestLine { method: method.to_string(), uri: uri.to_string(), version_minor: minor }))
}

enum HeaderLineOutcome {
  Again,
  Done,
  Header(HeaderEntry),
}

fn parse_header_line(cursor: &mut Cursor, lower_scratch: &mut Vec<u8>) -> Result<HeaderLineOutcome, HttpError> {
  // A bare CRLF here means end-of-headers (the blank line).
  if cursor.remaining().starts_with(b"\r\n") {
    cursor.advance(2);
    return Ok(HeaderLineOutcome::Done);
  }

  let start = cursor.pos();
  let Some(line_len) = find_crlf(cursor.remaining()) else {
    return Ok(HeaderLineOutcome::Again);
  };
  let line = cursor.slice(start, start + line_len);
  cursor.advance(line_len + 2);

  let colon = line.iter().position(|&b| b == b':').ok_or(HttpError::MalformedHeaderLine)?;
  if colon == 0 {
    return Err(HttpError::MalformedHeaderLine);
  }
  let name = &line[..colon];
  let mut value = &line[colon + 1..];
  // Optional whitespace (spec §4.6 "name, separator, optional-whitespace,
  // value").
  while value.first() == Some(&b' ') || value.first() == Some(&b'\t') {
    value = &value[1..];
  }
  while value.last() == Some(&b' ') || value.last() == Some(&b'\t') {
    value = &value[..value.len() - 1];
  }

  crate::headers::lowercase_into(name, lower_scratch);
  let hash = rolling_hash(lower_scratch);

  let name_str = std::str::from_utf8(name).map_err(|_| HttpError::MalformedHeaderLine)?;
  let lowercase_name = std::str::from_utf8(lower_scratch).map_err(|_| HttpError::MalformedHeaderLine)?.to_string();
  let value_str = std::str::from_utf8(value).map_err(|_| HttpError::MalformedHeaderLine)?;

  Ok(HeaderLineOutcome::Header(HeaderEntry {
    hash,
    name: name_str.to_string(),
    lowercase_name,
    value: value_str.to_string(),
  }))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
  buf.windows(2).position(|w| w == b"\r\n")
}

fn check_duplicate(existing: &HeaderTable, entry: &HeaderEntry) -> Result<(), HttpError> {
  let Some(spec) = crate::headers::lookup(&entry.lowercase_name) else {
    return Ok(());
  };
  let is_unique = matches!(spec.kind, HeaderKind::Unique | HeaderKind::Host);
  if is_unique && existing.first(&entry.lowercase_name).is_some() {
    return Err(HttpError::DuplicateHeader(match entry.lowercase_name.as_str() {
      "host" => "Host",
      "content-length" => "Content-Length",
      "sec-websocket-version" => "Sec-WebSocket-Version",
      "sec-websocket-extensions" => "Sec-WebSocket-Extensions",
      "upgrade" => "Upgrade",
      _ => "header",
    }));
  }
  Ok(())
}

fn finish_request(line: RequestLine, inbound: HeaderTable) -> Result<Request, HttpError> {
  let connection_is_upgrade = inbound
    .first("connection")
    .map(|h| ByteStr::new(h.value.as_bytes()).contains(b"Upgrade"))
    .unwrap_or(false);

  if inbound.first("connection").is_some() && !connection_is_upgrade {
    return Err(HttpError::NotUpgrade);
  }

  let upgrade_is_websocket =
    inbound.first("upgrade").map(|h| h.value.to_ascii_lowercase().contains("websocket")).unwrap_or(false);

  let sec_websocket_version_13 = inbound.first("sec-websocket-version").map(|h| h.value == "13").unwrap_or(false);

  let key_header = inbound.first("sec-websocket-key");
  let sec_websocket_key_valid = key_header
    .map(|h| {
      base64::engine::general_purpose::STANDARD
        .decode(h.value.trim())
        .map(|bytes| bytes.len() == 16)
        .unwrap_or(false)
    })
    .unwrap_or(false);

  let sec_websocket_accept = if sec_websocket_key_valid {
    let key = key_header.unwrap().value.trim();
    Some(compute_accept_key(key))
  } else {
    None
  };

  Ok(Request {
    line,
    inbound,
    sec_websocket_accept,
    connection_is_upgrade,
    upgrade_is_websocket,
    sec_websocket_version_13,
    sec_websocket_key_valid,
  })
}

/// `base64(SHA1(key ++ "258EAFA5-E914-47DA-95CA-C5AB0DC85B11"))` (spec §4.6,
/// tested against the fixture in spec §8.4).
pub fn compute_accept_key(key: &str) -> String {
  let mut hasher = Sha1::new();
  hasher.update(key.as_bytes());
  hasher.update(WEBSOCKET_GUID.as_bytes());
  let digest = hasher.finalize();
  base64::engine::general_purpose::STANDARD.encode(digest)
}

impl Request {
  /// The full RFC 6455 gate (spec Design Notes §9, first Open Question):
  /// the original only checked for the presence of the `Upgrade` header.
  /// We additionally require the `Connection: Upgrade` token, version 13,
  /// and a well-formed 16-byte key before issuing a 101.
  pub fn is_valid_handshake(&self) -> bool {
    self.connection_is_upgrade
      && self.upgrade_is_websocket
      && self.sec_websocket_version_13
      && self.sec_websocket_key_valid
  }
}

/// Builds the wire response for a request, per spec §4.6's exact byte
/// layout, or the appropriate 4xx/5xx on failure.
pub fn build_response(request: &Request, server_header: &str) -> Vec<u8> {
  if request.is_valid_handshake() {
    let accept = request.sec_websocket_accept.as_deref().unwrap_or_default();
    format!(
      "HTTP/1.1 101 Switching Protocols\r\nServer: {server}\r\nUpgrade: websocket\r\nConnection: upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n",
      server = server_header,
      accept = accept,
    )
    .into_bytes()
  } else {
    build_error_response(400, server_header)
  }
}

/// Builds a minimal error response for the given status code (spec §4.6
/// "minimal 400 Bad Request body"; generalized to the other status codes in
/// the §4.6/§7 error table).
pub fn build_error_response(status: u16, server_header: &str) -> Vec<u8> {
  let reason = match status {
    400 => "Bad Request",
    500 => "Internal Server Error",
    501 => "Not Implemented",
    505 => "HTTP Version Not Supported",
    _ => "Error",
  };
  let body = format!("{}\n", server_header);
  format!(
    "HTTP/1.1 {status} {reason}\r\nServer: {server}\r\nContent-Type: text/html\r\nContent-Length: {len}\r\n\r\n{body}",
    status = status,
    reason = reason,
    server = server_header,
    len = body.len(),
    body = body,
  )
  .into_bytes()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ok_request() -> &'static [u8] {
    b"GET /chat HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n"
  }

  #[test]
  fn happy_handshake_parses_and_consumes_exact_terminator() {
    let input = ok_request();
    match parse_request(input).unwrap() {
      ParseOutcome::Done { request, consumed } => {
        assert_eq!(consumed, input.len());
        assert_eq!(request.inbound.len(), 5);
        assert!(request.is_valid_handshake());
        assert_eq!(request.sec_websocket_accept.as_deref(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
      }
      ParseOutcome::Again => panic!("expected Done"),
    }
  }

  #[test]
  fn accept_key_matches_rfc6455_fixture() {
    assert_eq!(compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
  }

  #[test]
  fn partial_request_reports_again() {
    let input = b"GET /chat HTTP/1.1\r\nHost: x\r\n";
    assert!(matches!(parse_request(input).unwrap(), ParseOutcome::Again));
  }

  #[test]
  fn missing_upgrade_headers_is_not_a_valid_handshake() {
    let input = b"GET /chat HTTP/1.1\r\nHost: x\r\n\r\n";
    match parse_request(input).unwrap() {
      ParseOutcome::Done { request, .. } => assert!(!request.is_valid_handshake()),
      ParseOutcome::Again => panic!("expected Done"),
    }
  }

  #[test]
  fn wrong_connection_token_is_rejected() {
    let input = b"GET /chat HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n";
    assert!(matches!(parse_request(input), Err(HttpError::NotUpgrade)));
  }

  #[test]
  fn duplicate_host_header_is_bad_request() {
    let input = b"GET /chat HTTP/1.1\r\nHost: a\r\nHost: b\r\n\r\n";
    assert!(matches!(parse_request(input), Err(HttpError::DuplicateHeader("Host"))));
  }

  #[test]
  fn http_version_below_1_1_is_rejected() {
    let input = b"GET / HTTP/1.0\r\n\r\n";
    assert!(matches!(parse_request(input), Err(HttpError::VersionNotSupported)));
  }

  #[test]
  fn build_response_for_valid_handshake_has_101_first_line() {
    let input = ok_request();
    let request = match parse_request(input).unwrap() {
      ParseOutcome::Done { request, .. } => request,
      _ => unreachable!(),
    };
    let resp = build_response(&request, "chatease-server/0.1.0");
    let text = String::from_utf8(resp).unwrap();
    assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
  }
}
