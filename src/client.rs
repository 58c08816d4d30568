//! Programmatic client for the chat relay
//!
//! Speaks the documented routes over one TCP connection per request, the
//! way the wire protocol expects: write the request, half-close, read the
//! response. This is the library surface an interactive console front-end
//! would sit on; the console itself (prompts, local echo, read loop) is
//! out of scope here.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::protocol::messages::{ClientIdentity, MessagePayload};
use crate::protocol::request::{Request, Route, MAX_LINE_SIZE};
use crate::protocol::response::Status;
use crate::server::file_relay::encode_upload;

/// Chat relay client
#[derive(Debug, Clone)]
pub struct RelayClient {
    server_addr: SocketAddr,
    identity: ClientIdentity,
    /// Upload size ceiling enforced before transmission; the relay does
    /// not re-validate
    max_upload_size: usize,
}

impl RelayClient {
    /// Create a client with a fresh random identity token
    pub fn new(server_addr: SocketAddr, name: impl Into<String>) -> Self {
        Self::with_identity(
            server_addr,
            ClientIdentity::new(name, Uuid::new_v4().to_string()),
        )
    }

    /// Create a client reusing a stored identity (reconnect)
    pub fn with_identity(server_addr: SocketAddr, identity: ClientIdentity) -> Self {
        Self {
            server_addr,
            identity,
            max_upload_size: 16 * 1024 * 1024,
        }
    }

    /// Override the upload size ceiling
    pub fn with_max_upload_size(mut self, max_upload_size: usize) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    /// This client's identity
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Connect and return the replayed history, if any
    pub async fn connect(&self) -> Result<String> {
        let body = self.request(Route::Connect, self.identity_body()?).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Broadcast a message to the chat
    pub async fn send(&self, msg: &str) -> Result<()> {
        let payload = MessagePayload::broadcast(&self.identity, msg);
        self.request(Route::Send, serde_json::to_vec(&payload)?)
            .await?;
        Ok(())
    }

    /// Send a private message to a named recipient
    pub async fn send_to(&self, to_user: &str, msg: &str) -> Result<()> {
        let payload = MessagePayload::addressed(&self.identity, to_user, msg);
        self.request(Route::SendTo, serde_json::to_vec(&payload)?)
            .await?;
        Ok(())
    }

    /// Send one console line: `@name message` addresses a recipient,
    /// anything else is broadcast
    pub async fn send_line(&self, line: &str) -> Result<()> {
        if let Some(rest) = line.strip_prefix('@') {
            if let Some((to_user, msg)) = rest.split_once(' ') {
                return self.send_to(to_user, msg).await;
            }
        }
        self.send(line).await
    }

    /// Poll for the next pending update, private entries first
    pub async fn get_update(&self) -> Result<Option<String>> {
        let body = self
            .request(Route::GetUpdate, self.identity_body()?)
            .await?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }

    /// Fetch the server status line
    pub async fn status(&self) -> Result<String> {
        let body = self.request(Route::Status, Vec::new()).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Leave the chat, keeping the session resumable server-side
    pub async fn close(&self) -> Result<()> {
        self.request(Route::Close, self.identity_body()?).await?;
        Ok(())
    }

    /// Upload a file under this client's name, returning the artifact name
    ///
    /// Rejected locally when the payload exceeds the upload ceiling.
    pub async fn send_file(&self, file_id: &str, format: &str, bytes: &[u8]) -> Result<String> {
        if bytes.len() > self.max_upload_size {
            return Err(RelayError::oversized_upload(format!(
                "Upload of {} bytes exceeds ceiling of {} bytes",
                bytes.len(),
                self.max_upload_size
            )));
        }
        let payload = encode_upload(&self.identity.name, file_id, format, bytes);
        let body = self.request(Route::SendFile, payload).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetch the next file not yet delivered to this client
    pub async fn get_file(&self) -> Result<Option<(String, Bytes)>> {
        let body = self.request(Route::GetFile, self.identity_body()?).await?;
        if body.is_empty() {
            return Ok(None);
        }
        let newline = body
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| RelayError::parse("File reply missing filename line"))?;
        let filename = String::from_utf8_lossy(&body[..newline]).into_owned();
        Ok(Some((filename, body.slice(newline + 1..))))
    }

    fn identity_body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.identity)?)
    }

    /// One request/response cycle on a fresh connection
    async fn request(&self, route: Route, body: impl Into<Bytes>) -> Result<Bytes> {
        let stream = TcpStream::connect(self.server_addr)
            .await
            .map_err(|e| RelayError::network(format!("Failed to connect: {}", e)))?;
        let (read_half, mut write_half) = stream.into_split();

        let request = Request::new(route, body);
        write_half.write_all(&request.encode()).await?;
        write_half.shutdown().await?;

        let mut reader = BufReader::new(read_half);
        let (status, body) = read_response(&mut reader).await?;
        debug!("{} -> {}", route.path(), status.code());
        check_status(status, body)
    }
}

/// Read one response line with the line size cap enforced mid-read, so a
/// misbehaving server cannot buffer unbounded bytes into the client
async fn read_bounded_line<R>(reader: &mut R, line: &mut String) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let mut raw = Vec::new();
    let mut limited = (&mut *reader).take(MAX_LINE_SIZE as u64 + 1);
    let n = limited.read_until(b'\n', &mut raw).await?;
    if raw.len() > MAX_LINE_SIZE {
        return Err(RelayError::parse("Response header line too long"));
    }
    line.push_str(
        std::str::from_utf8(&raw)
            .map_err(|_| RelayError::parse("Response header line is not UTF-8"))?,
    );
    Ok(n)
}

/// Read a response: status line, headers, body framed by Content-Length
async fn read_response<R>(reader: &mut R) -> Result<(Status, Bytes)>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    read_bounded_line(reader, &mut line).await?;
    let code = line
        .split_whitespace()
        .nth(1)
        .and_then(|t| t.parse::<u16>().ok())
        .ok_or_else(|| RelayError::parse(format!("Bad status line: {:?}", line.trim_end())))?;
    let status = Status::from_code(code)
        .ok_or_else(|| RelayError::parse(format!("Unknown status code: {}", code)))?;

    let mut content_length: Option<usize> = None;
    loop {
        let n = read_bounded_line(reader, &mut line).await?;
        if n == 0 {
            return Err(RelayError::parse("Response truncated in headers"));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let body = match content_length {
        Some(len) => {
            let mut body = vec![0u8; len];
            reader
                .read_exact(&mut body)
                .await
                .map_err(|_| RelayError::parse("Response body truncated"))?;
            Bytes::from(body)
        }
        None => {
            let mut body = Vec::new();
            reader.read_to_end(&mut body).await?;
            Bytes::from(body)
        }
    };
    Ok((status, body))
}

fn check_status(status: Status, body: Bytes) -> Result<Bytes> {
    if status == Status::Ok {
        return Ok(body);
    }
    let text = String::from_utf8_lossy(&body).into_owned();
    match status {
        Status::BadRequest => Err(RelayError::parse(text)),
        Status::NotFound => Err(RelayError::not_found(text)),
        Status::TooManyRequests => Err(RelayError::rate_limited(text)),
        _ => Err(RelayError::internal(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_read_response_with_body() {
        let raw = b"HTTP/1.1 200 OK\nContent-Type: text/plain\nContent-Length: 9\n\nalice: hi";
        let mut reader = BufReader::new(&raw[..]);
        let (status, body) = read_response(&mut reader).await.unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(&body[..], b"alice: hi");
    }

    #[tokio::test]
    async fn test_read_response_error_status() {
        let raw = b"HTTP/1.1 429 Too Many Requests\nContent-Type: text/plain\nContent-Length: 4\n\nslow";
        let mut reader = BufReader::new(&raw[..]);
        let (status, body) = read_response(&mut reader).await.unwrap();
        assert_eq!(status, Status::TooManyRequests);
        let err = check_status(status, body).unwrap_err();
        assert!(matches!(err, RelayError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_oversized_status_line_fails_before_peer_closes() {
        // The writer stays open: the cap must trip mid-read, not at EOF
        let (mut peer, local) = tokio::io::duplex(4 * MAX_LINE_SIZE);
        let mut reader = BufReader::new(local);
        peer.write_all(&vec![b'x'; 3 * MAX_LINE_SIZE]).await.unwrap();

        let err = read_response(&mut reader).await.unwrap_err();
        assert!(matches!(err, RelayError::Parse(_)));
        drop(peer);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_locally() {
        let client = RelayClient::new("127.0.0.1:1".parse().unwrap(), "alice")
            .with_max_upload_size(4);
        let err = client.send_file("1", "bin", &[0u8; 5]).await.unwrap_err();
        assert!(matches!(err, RelayError::OversizedUpload(_)));
    }

    #[test]
    fn test_fresh_identities_are_unique() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let a = RelayClient::new(addr, "same");
        let b = RelayClient::new(addr, "same");
        assert_eq!(a.identity().name, b.identity().name);
        assert_ne!(a.identity().id, b.identity().id);
    }
}
