//! Protocol layer for the chat relay
//!
//! This module provides:
//! - Request lexing over the fixed wire grammar (request line, header block, body)
//! - Response serialization
//! - Wire body type definitions

pub mod messages;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use messages::{ClientIdentity, MessagePayload, PROTO_VERSION};
pub use request::{read_request, Method, Request, Route};
pub use response::{Response, Status};
