//! Relay server implementation
//!
//! This module provides the in-memory state machine behind the documented
//! routes and the dispatcher that drives it:
//!
//! - **Connection registry**: connected/disconnected session sets
//! - **Message store**: bounded ring buffer of broadcast messages
//! - **Mailbox**: per-recipient queues of private messages
//! - **Rate limiter**: sliding-window send quota
//! - **File relay**: keyed artifact store with delivery tracking
//! - **Dispatcher**: one request/response cycle per TCP connection

pub mod file_relay;
pub mod mailbox;
pub mod message_store;
pub mod rate_limit;
pub mod registry;
pub mod relay;

pub use file_relay::FileRelay;
pub use mailbox::Mailbox;
pub use message_store::{BroadcastMessage, MessageStore};
pub use rate_limit::RateLimiter;
pub use registry::{ConnectOutcome, ConnectionRegistry, Session, ThrottleState};
pub use relay::RelayServer;
