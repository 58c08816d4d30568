//! Error handling for the chat relay

use std::fmt;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Chat relay error types
#[derive(Debug, Clone)]
pub enum RelayError {
    /// Network-related errors
    Network(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Malformed wire framing
    Parse(String),
    /// Unknown route or unknown client identity
    NotFound(String),
    /// Per-session send quota exhausted
    RateLimited(String),
    /// Upload larger than the configured ceiling (client-side check)
    OversizedUpload(String),
    /// Server internal error
    Internal(String),
    /// Configuration error
    Config(String),
}

impl RelayError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            RelayError::Network(_) => 1000,
            RelayError::Serialization(_) => 1001,
            RelayError::Parse(_) => 1002,
            RelayError::NotFound(_) => 1003,
            RelayError::RateLimited(_) => 1004,
            RelayError::OversizedUpload(_) => 1005,
            RelayError::Internal(_) => 1006,
            RelayError::Config(_) => 1007,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            RelayError::Network(msg) => msg,
            RelayError::Serialization(msg) => msg,
            RelayError::Parse(msg) => msg,
            RelayError::NotFound(msg) => msg,
            RelayError::RateLimited(msg) => msg,
            RelayError::OversizedUpload(msg) => msg,
            RelayError::Internal(msg) => msg,
            RelayError::Config(msg) => msg,
        }
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        RelayError::Network(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        RelayError::Serialization(msg.into())
    }

    /// Create a parse error
    pub fn parse<T: Into<String>>(msg: T) -> Self {
        RelayError::Parse(msg.into())
    }

    /// Create a not-found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        RelayError::NotFound(msg.into())
    }

    /// Create a rate-limited error
    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        RelayError::RateLimited(msg.into())
    }

    /// Create an oversized-upload error
    pub fn oversized_upload<T: Into<String>>(msg: T) -> Self {
        RelayError::OversizedUpload(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        RelayError::Internal(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        RelayError::Config(msg.into())
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Network(msg) => write!(f, "Network error: {}", msg),
            RelayError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            RelayError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RelayError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RelayError::RateLimited(msg) => write!(f, "Rate limit exceeded: {}", msg),
            RelayError::OversizedUpload(msg) => write!(f, "Oversized upload: {}", msg),
            RelayError::Internal(msg) => write!(f, "Internal error: {}", msg),
            RelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Network(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<std::net::AddrParseError> for RelayError {
    fn from(err: std::net::AddrParseError) -> Self {
        RelayError::Config(format!("Address error: {}", err))
    }
}
