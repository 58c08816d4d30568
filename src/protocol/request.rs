//! Request lexer for the minimal wire protocol
//!
//! Grammar is fixed and small:
//!
//! ```text
//! <METHOD> <PATH> <PROTO-VERSION>\r\n
//! <header lines, ignored except Content-Length>\r\n
//! \r\n
//! <body>
//! ```
//!
//! The lexer walks explicit states over that grammar instead of pattern
//! matching raw bytes. No arbitrary header handling, no chunked transfer,
//! no keep-alive: one request per connection. A missing blank-line delimiter
//! or a body shorter than its declared length is a parse failure.

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{RelayError, Result};
use crate::protocol::messages::PROTO_VERSION;

/// Maximum length of a single header or request line (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Request methods the relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Parse a method token, returns None for unknown methods
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }

    /// Wire token for this method
    pub fn as_token(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// The finite set of routes the dispatcher serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Connect,
    Send,
    SendTo,
    GetUpdate,
    Status,
    Close,
    SendFile,
    GetFile,
}

impl Route {
    /// Resolve a (method, path) pair to a route, returns None for
    /// unroutable requests
    pub fn resolve(method: Method, path: &str) -> Option<Self> {
        match (method, path) {
            (Method::Post, "/connect") => Some(Route::Connect),
            (Method::Post, "/send") => Some(Route::Send),
            (Method::Post, "/sendto") => Some(Route::SendTo),
            (Method::Get, "/getupdate") => Some(Route::GetUpdate),
            (Method::Get, "/status") => Some(Route::Status),
            (Method::Post, "/close") => Some(Route::Close),
            (Method::Post, "/send-file") => Some(Route::SendFile),
            (Method::Post, "/get-file") => Some(Route::GetFile),
            _ => None,
        }
    }

    /// Wire path for this route
    pub fn path(&self) -> &'static str {
        match self {
            Route::Connect => "/connect",
            Route::Send => "/send",
            Route::SendTo => "/sendto",
            Route::GetUpdate => "/getupdate",
            Route::Status => "/status",
            Route::Close => "/close",
            Route::SendFile => "/send-file",
            Route::GetFile => "/get-file",
        }
    }

    /// Wire method for this route
    pub fn method(&self) -> Method {
        match self {
            Route::GetUpdate | Route::Status => Method::Get,
            _ => Method::Post,
        }
    }
}

/// A decoded wire request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Bytes,
}

impl Request {
    /// Build a request for a route (client side)
    pub fn new(route: Route, body: impl Into<Bytes>) -> Self {
        Self {
            method: route.method(),
            path: route.path().to_string(),
            body: body.into(),
        }
    }

    /// Encode this request to wire bytes, declaring the body length
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(
            format!(
                "{} {} {}\r\nContent-Length: {}\r\n\r\n",
                self.method.as_token(),
                self.path,
                PROTO_VERSION,
                self.body.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&self.body);
        Bytes::from(out)
    }
}

/// Lexer states over the request grammar
enum LexState {
    RequestLine,
    Headers,
    Body,
}

/// Read one complete request from the stream
///
/// Headers are skipped except `Content-Length`, which frames the body.
/// Without it, GET requests carry no body and other methods are read to
/// EOF (the peer half-closes after writing its request).
pub async fn read_request<R>(reader: &mut R) -> Result<Request>
where
    R: AsyncBufRead + Unpin,
{
    let mut state = LexState::RequestLine;
    let mut method = Method::Get;
    let mut path = String::new();
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        match state {
            LexState::RequestLine => {
                read_wire_line(reader, &mut line).await?;
                let mut tokens = line.split_whitespace();
                let method_token = tokens
                    .next()
                    .ok_or_else(|| RelayError::parse("Empty request line"))?;
                method = Method::from_token(method_token).ok_or_else(|| {
                    RelayError::parse(format!("Unknown method: {}", method_token))
                })?;
                path = tokens
                    .next()
                    .ok_or_else(|| RelayError::parse("Request line missing path"))?
                    .to_string();
                // Version token must be present; its value is not checked
                tokens
                    .next()
                    .ok_or_else(|| RelayError::parse("Request line missing version"))?;
                state = LexState::Headers;
            }
            LexState::Headers => {
                read_wire_line(reader, &mut line).await?;
                if line.is_empty() {
                    state = LexState::Body;
                    continue;
                }
                if let Some((key, value)) = line.split_once(':') {
                    if key.trim().eq_ignore_ascii_case("content-length") {
                        let len = value.trim().parse::<usize>().map_err(|_| {
                            RelayError::parse(format!("Bad Content-Length: {}", value.trim()))
                        })?;
                        content_length = Some(len);
                    }
                }
                // Other headers (and malformed header lines) are ignored
            }
            LexState::Body => {
                let body = read_body(reader, method, content_length).await?;
                return Ok(Request { method, path, body });
            }
        }
    }
}

/// Read one `\r\n`-terminated line, stripping the terminator
///
/// The size cap is enforced while reading: the read is routed through a
/// limited reader that reports EOF one byte past `MAX_LINE_SIZE`, so an
/// unterminated line fails at the cap instead of buffering the peer's
/// input until it closes the connection. EOF before the terminator means
/// the header block was truncated before its blank-line delimiter, which
/// is a framing error.
async fn read_wire_line<R>(reader: &mut R, line: &mut String) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let mut raw = Vec::new();
    let mut limited = (&mut *reader).take(MAX_LINE_SIZE as u64 + 1);
    let n = limited.read_until(b'\n', &mut raw).await?;
    if n == 0 {
        return Err(RelayError::parse(
            "Connection closed before blank-line delimiter",
        ));
    }
    if raw.len() > MAX_LINE_SIZE {
        return Err(RelayError::parse("Header line too long"));
    }
    if !raw.ends_with(b"\n") {
        return Err(RelayError::parse("Unterminated header line"));
    }
    while raw.ends_with(b"\n") || raw.ends_with(b"\r") {
        raw.pop();
    }
    line.push_str(
        std::str::from_utf8(&raw)
            .map_err(|_| RelayError::parse("Header line is not UTF-8"))?,
    );
    Ok(())
}

async fn read_body<R>(
    reader: &mut R,
    method: Method,
    content_length: Option<usize>,
) -> Result<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    match content_length {
        Some(0) => Ok(Bytes::new()),
        Some(len) => {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await.map_err(|_| {
                RelayError::parse(format!("Truncated body: expected {} bytes", len))
            })?;
            Ok(Bytes::from(body))
        }
        None => {
            if method == Method::Get {
                return Ok(Bytes::new());
            }
            let mut body = Vec::new();
            reader.read_to_end(&mut body).await?;
            Ok(Bytes::from(body))
        }
    }
}
