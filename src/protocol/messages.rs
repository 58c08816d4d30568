//! Wire body types for the chat relay
//!
//! JSON payloads carried in request bodies. Uses serde for serialization,
//! mirroring what the documented routes expect.

use serde::{Deserialize, Serialize};

/// Protocol version token used in request and status lines
pub const PROTO_VERSION: &str = "HTTP/1.1";

/// Identity a client presents on connect, poll, and close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Display name, used for broadcast attribution and private addressing
    pub name: String,
    /// Opaque unique token, immutable for the life of the session
    pub id: String,
    /// Whether the client is banned from sending
    #[serde(default)]
    pub banned: bool,
}

impl ClientIdentity {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            banned: false,
        }
    }
}

/// Body of a broadcast or addressed send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Sender display name
    pub name: String,
    /// Sender identity token
    pub id: String,
    /// Message text
    pub msg: Option<String>,
    /// Recipient display name for addressed sends
    pub to_user: Option<String>,
}

impl MessagePayload {
    /// Build a broadcast payload
    pub fn broadcast(identity: &ClientIdentity, msg: impl Into<String>) -> Self {
        Self {
            name: identity.name.clone(),
            id: identity.id.clone(),
            msg: Some(msg.into()),
            to_user: None,
        }
    }

    /// Build an addressed payload
    pub fn addressed(
        identity: &ClientIdentity,
        to_user: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            name: identity.name.clone(),
            id: identity.id.clone(),
            msg: Some(msg.into()),
            to_user: Some(to_user.into()),
        }
    }
}
