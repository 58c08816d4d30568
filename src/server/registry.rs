//! Connection registry: session lifecycle and reconnection
//!
//! Sessions are owned exclusively by the registry and move between the
//! connected and disconnected sets; they are never deleted while the
//! process runs. An identity is a member of exactly one set at a time.
//! Reconnecting reactivates the disconnected session with its delivery
//! cursor and rate-limit counters intact.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{RelayError, Result};
use crate::protocol::messages::ClientIdentity;
use crate::server::rate_limit::RateLimiter;

/// Per-session rate-limit counters, owned by the session record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleState {
    /// Sends accepted in the current window
    pub sent_count: u32,
    /// Whether the quota has been tripped
    pub over_limit: bool,
    /// When the tripped window ends; None while not over-limit
    pub window_reset_at: Option<Instant>,
}

/// Server-side record of a connected or recently-disconnected client
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: ClientIdentity,
    /// Highest broadcast sequence delivered to this session, non-decreasing
    pub last_delivered_sequence: u64,
    pub throttle: ThrottleState,
}

impl Session {
    fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            last_delivered_sequence: 0,
            throttle: ThrottleState::default(),
        }
    }
}

/// Outcome of a connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// First time this identity was seen
    Fresh,
    /// A disconnected session was reactivated with its state preserved
    Reconnected,
    /// The identity was already in the connected set; no state changed
    AlreadyConnected,
}

/// Registry of client sessions
///
/// Lock order is connected before disconnected wherever both are taken.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connected: RwLock<HashMap<String, Session>>,
    disconnected: RwLock<HashMap<String, Session>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an identity into the connected set
    ///
    /// A known disconnected identity is moved back with its cursor and
    /// throttle counters untouched. An unknown identity gets a fresh
    /// session with a zero cursor; the connect handler replays buffered
    /// history and advances the cursor to the buffer tail afterward, so a
    /// first-time joiner sees full history exactly once.
    pub async fn connect(&self, identity: ClientIdentity) -> ConnectOutcome {
        let mut connected = self.connected.write().await;
        if connected.contains_key(&identity.id) {
            debug!("Client '{}' connected twice, ignoring", identity.name);
            return ConnectOutcome::AlreadyConnected;
        }

        let mut disconnected = self.disconnected.write().await;
        if let Some(session) = disconnected.remove(&identity.id) {
            info!("Client '{}' reconnected", session.identity.name);
            connected.insert(identity.id.clone(), session);
            return ConnectOutcome::Reconnected;
        }

        info!("Client '{}' connected", identity.name);
        connected.insert(identity.id.clone(), Session::new(identity));
        ConnectOutcome::Fresh
    }

    /// Move an identity from connected to disconnected, preserving state
    pub async fn close(&self, id: &str) -> Result<()> {
        let mut connected = self.connected.write().await;
        let session = connected
            .remove(id)
            .ok_or_else(|| RelayError::not_found(format!("Unknown client id: {}", id)))?;

        let mut disconnected = self.disconnected.write().await;
        info!("Client '{}' disconnected", session.identity.name);
        disconnected.insert(id.to_string(), session);
        Ok(())
    }

    /// Count of connected sessions
    pub async fn connected_count(&self) -> usize {
        self.connected.read().await.len()
    }

    /// Whether an identity is currently in the connected set
    pub async fn is_connected(&self, id: &str) -> bool {
        self.connected.read().await.contains_key(id)
    }

    /// Delivery cursor of a connected session
    pub async fn delivery_cursor(&self, id: &str) -> Result<u64> {
        let connected = self.connected.read().await;
        connected
            .get(id)
            .map(|s| s.last_delivered_sequence)
            .ok_or_else(|| RelayError::not_found(format!("Unknown client id: {}", id)))
    }

    /// Advance a session's delivery cursor, never moving it backward
    pub async fn advance_cursor(&self, id: &str, sequence: u64) {
        let mut connected = self.connected.write().await;
        if let Some(session) = connected.get_mut(id) {
            if sequence > session.last_delivered_sequence {
                session.last_delivered_sequence = sequence;
            }
        }
    }

    /// Apply the send quota to a connected session
    ///
    /// Fails NotFound for identities outside the connected set and rejects
    /// banned clients outright.
    pub async fn check_rate(&self, id: &str, limiter: &RateLimiter) -> Result<()> {
        let mut connected = self.connected.write().await;
        let session = connected
            .get_mut(id)
            .ok_or_else(|| RelayError::not_found(format!("Unknown client id: {}", id)))?;
        if session.identity.banned {
            return Err(RelayError::rate_limited(
                "Sending is disabled for this client",
            ));
        }
        limiter.check(&mut session.throttle, Instant::now())
    }

    /// Snapshot a session's record (connected or disconnected)
    pub async fn session(&self, id: &str) -> Option<Session> {
        if let Some(session) = self.connected.read().await.get(id) {
            return Some(session.clone());
        }
        self.disconnected.read().await.get(id).cloned()
    }
}
