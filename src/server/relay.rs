//! TCP accept loop and request dispatcher
//!
//! Each accepted connection serves exactly one request/response cycle:
//! parse the request, resolve it against the finite route set, run the
//! handler against shared relay state, write the response, close the
//! socket. There is no keep-alive. A malformed or failing request is
//! answered with an error response and never aborts the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::{RelayError, Result};
use crate::protocol::messages::{ClientIdentity, MessagePayload};
use crate::protocol::request::{read_request, Request, Route};
use crate::protocol::response::{Response, Status};
use crate::server::file_relay::FileRelay;
use crate::server::mailbox::{format_private, Mailbox};
use crate::server::message_store::MessageStore;
use crate::server::rate_limit::RateLimiter;
use crate::server::registry::ConnectionRegistry;
use crate::RelayConfig;

/// Shared relay state, one instance per server, lifetime = process lifetime
#[derive(Debug)]
pub struct RelayState {
    registry: ConnectionRegistry,
    store: MessageStore,
    mailbox: Mailbox,
    files: FileRelay,
    limiter: RateLimiter,
}

impl RelayState {
    fn new(config: &RelayConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store: MessageStore::new(config.buffer_capacity),
            mailbox: Mailbox::new(),
            files: FileRelay::new(config.files_dir.clone()),
            limiter: RateLimiter::new(config.message_limit, config.rate_window),
        }
    }

    async fn handle_connect(&self, body: &[u8]) -> Result<Response> {
        let identity = parse_identity(body)?;
        let id = identity.id.clone();
        self.registry.connect(identity).await;

        // Replay everything past the session cursor in one response and
        // park the cursor at the buffer tail. A fresh session starts at
        // cursor 0 and therefore receives full history exactly once; a
        // reconnecting session catches up from where it left off.
        let cursor = self.registry.delivery_cursor(&id).await?;
        match self.store.replay_after(cursor).await {
            Some((text, max_sequence)) => {
                self.registry.advance_cursor(&id, max_sequence).await;
                Ok(Response::text(text))
            }
            None => Ok(Response::empty()),
        }
    }

    async fn handle_send(&self, body: &[u8]) -> Result<Response> {
        let payload = parse_payload(body)?;
        let msg = payload
            .msg
            .ok_or_else(|| RelayError::parse("Send payload missing msg"))?;

        self.registry.check_rate(&payload.id, &self.limiter).await?;
        let sequence = self.store.append(&payload.name, msg).await;
        debug!("Broadcast #{} from '{}'", sequence, payload.name);
        Ok(Response::empty())
    }

    async fn handle_send_to(&self, body: &[u8]) -> Result<Response> {
        let payload = parse_payload(body)?;
        let msg = payload
            .msg
            .ok_or_else(|| RelayError::parse("Send payload missing msg"))?;
        let to_user = payload
            .to_user
            .ok_or_else(|| RelayError::parse("Addressed payload missing to_user"))?;

        self.registry.check_rate(&payload.id, &self.limiter).await?;
        self.mailbox
            .deposit(to_user, format_private(&payload.name, &msg))
            .await;
        Ok(Response::empty())
    }

    async fn handle_get_update(&self, body: &[u8]) -> Result<Response> {
        let identity = parse_identity(body)?;

        // Pending private entries take priority over broadcast catch-up
        if let Some(entry) = self.mailbox.take_next(&identity.name).await {
            return Ok(Response::text(entry));
        }

        let cursor = self.registry.delivery_cursor(&identity.id).await?;
        match self.store.next_after(cursor).await {
            Some((sequence, line)) => {
                self.registry.advance_cursor(&identity.id, sequence).await;
                Ok(Response::text(line))
            }
            None => Ok(Response::empty()),
        }
    }

    async fn handle_status(&self) -> Result<Response> {
        let count = self.registry.connected_count().await;
        Ok(Response::text(format!(
            "Status: OK. There is/are {} user/s in the chat",
            count
        )))
    }

    async fn handle_close(&self, body: &[u8]) -> Result<Response> {
        let identity = parse_identity(body)?;
        self.registry.close(&identity.id).await?;
        Ok(Response::empty())
    }

    async fn handle_send_file(&self, body: &[u8]) -> Result<Response> {
        let filename = self.files.ingest(body).await?;
        Ok(Response::text(filename))
    }

    async fn handle_get_file(&self, body: &[u8]) -> Result<Response> {
        let identity = parse_identity(body)?;
        if !self.registry.is_connected(&identity.id).await {
            return Err(RelayError::not_found(format!(
                "Unknown client id: {}",
                identity.id
            )));
        }
        match self.files.fetch(&identity.id).await {
            Some((filename, bytes)) => {
                let mut framed = BytesMut::with_capacity(filename.len() + 1 + bytes.len());
                framed.extend_from_slice(filename.as_bytes());
                framed.extend_from_slice(b"\n");
                framed.extend_from_slice(&bytes);
                Ok(Response::octets(framed.freeze()))
            }
            None => Ok(Response::empty()),
        }
    }
}

fn parse_identity(body: &[u8]) -> Result<ClientIdentity> {
    serde_json::from_slice(body)
        .map_err(|e| RelayError::parse(format!("Bad identity body: {}", e)))
}

fn parse_payload(body: &[u8]) -> Result<MessagePayload> {
    serde_json::from_slice(body)
        .map_err(|e| RelayError::parse(format!("Bad message body: {}", e)))
}

/// Route a decoded request to its handler and map failures to responses
async fn dispatch(state: &RelayState, request: Request) -> Response {
    let route = match Route::resolve(request.method, &request.path) {
        Some(route) => route,
        None => {
            warn!("Unroutable request: {} {}", request.method.as_token(), request.path);
            return Response::error(Status::NotFound, "No such route");
        }
    };

    let result = match route {
        Route::Connect => state.handle_connect(&request.body).await,
        Route::Send => state.handle_send(&request.body).await,
        Route::SendTo => state.handle_send_to(&request.body).await,
        Route::GetUpdate => state.handle_get_update(&request.body).await,
        Route::Status => state.handle_status().await,
        Route::Close => state.handle_close(&request.body).await,
        Route::SendFile => state.handle_send_file(&request.body).await,
        Route::GetFile => state.handle_get_file(&request.body).await,
    };

    match result {
        Ok(response) => response,
        Err(e) => error_response(route, e),
    }
}

fn error_response(route: Route, err: RelayError) -> Response {
    match err {
        RelayError::Parse(_) | RelayError::Serialization(_) => {
            warn!("Bad request on {} (code {}): {}", route.path(), err.code(), err);
            Response::error(Status::BadRequest, err.message().to_string())
        }
        RelayError::NotFound(_) => {
            warn!("Not found on {} (code {}): {}", route.path(), err.code(), err);
            Response::error(Status::NotFound, err.message().to_string())
        }
        RelayError::RateLimited(_) => {
            debug!("Rate limited on {} (code {}): {}", route.path(), err.code(), err);
            Response::error(Status::TooManyRequests, err.message().to_string())
        }
        _ => {
            error!("Handler failed on {} (code {}): {}", route.path(), err.code(), err);
            Response::error(Status::Internal, "")
        }
    }
}

/// Serve one connection: parse, dispatch, respond, close
async fn handle_connection(
    state: Arc<RelayState>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    debug!("New connection from {}", peer);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match read_request(&mut reader).await {
        Ok(request) => dispatch(&state, request).await,
        Err(e) => {
            warn!("Failed to parse request from {}: {}", peer, e);
            Response::error(Status::BadRequest, e.message().to_string())
        }
    };

    write_half.write_all(&response.encode()).await?;
    write_half.shutdown().await?;
    debug!("Connection from {} closed", peer);
    Ok(())
}

/// The chat relay server
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RelayServer {
    /// Bind the listener without starting to serve
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| RelayError::network(format!("Failed to bind: {}", e)))?;
        let local_addr = listener.local_addr()?;
        info!("Relay server listening on {}", local_addr);
        Ok(Self {
            state: Arc::new(RelayState::new(&config)),
            listener,
            local_addr,
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept and serve connections until the listener fails
    pub async fn serve(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream, peer).await {
                            error!("Connection handling failed: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                }
            }
        }
    }
}

/// Build a raw request body for tests and the client
pub fn identity_body(identity: &ClientIdentity) -> Bytes {
    Bytes::from(serde_json::to_vec(identity).expect("identity serializes"))
}
