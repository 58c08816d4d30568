//! Response serialization for the minimal wire protocol
//!
//! Response format:
//!
//! ```text
//! <version> <status>\n
//! Content-Type: <type>\n
//! Content-Length: <n>\n
//! \n
//! <body>
//! ```
//!
//! The body is raw bytes for file replies and UTF-8 text otherwise.

use bytes::Bytes;

use crate::protocol::messages::PROTO_VERSION;

/// Response status codes used by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    TooManyRequests,
    Internal,
}

impl Status {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::TooManyRequests => 429,
            Status::Internal => 500,
        }
    }

    /// Reason phrase for the status line
    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::TooManyRequests => "Too Many Requests",
            Status::Internal => "Internal Server Error",
        }
    }

    /// Parse a numeric code back to a status (client side)
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(Status::Ok),
            400 => Some(Status::BadRequest),
            404 => Some(Status::NotFound),
            429 => Some(Status::TooManyRequests),
            500 => Some(Status::Internal),
            _ => None,
        }
    }
}

/// A wire response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl Response {
    /// Empty 200 response
    pub fn empty() -> Self {
        Self {
            status: Status::Ok,
            content_type: "text/plain",
            body: Bytes::new(),
        }
    }

    /// 200 response with a UTF-8 text body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            content_type: "text/plain",
            body: Bytes::from(body.into()),
        }
    }

    /// 200 response with a raw byte body (file replies)
    pub fn octets(body: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Ok,
            content_type: "application/octet-stream",
            body: body.into(),
        }
    }

    /// Error response with an explanatory text body
    pub fn error(status: Status, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Bytes::from(body.into()),
        }
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(80 + self.body.len());
        out.extend_from_slice(
            format!(
                "{} {} {}\nContent-Type: {}\nContent-Length: {}\n\n",
                PROTO_VERSION,
                self.status.code(),
                self.status.reason(),
                self.content_type,
                self.body.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&self.body);
        Bytes::from(out)
    }
}
