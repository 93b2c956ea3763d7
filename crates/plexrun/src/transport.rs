//! # Transport Abstraction
//!
//! A minimal async interface for exchanging one encoded message for one
//! response.
//!
//! ## Philosophy
//!
//! - **Message-Oriented**: The transport moves opaque bodies. It never
//!   interprets content beyond splitting the response on the field
//!   delimiter, and it never sees a procedure name or argument.
//! - **Request-Response**: One request yields exactly one response or one
//!   error. The core never retries; retry and timeout policy, if any,
//!   lives in the transport itself and surfaces as an ordinary error.

use std::fmt;

/// Errors that occur at the transport layer. Propagated to callers
/// verbatim: a concrete connection failure is more actionable than a
/// generic one.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection dropped mid-exchange.
    ConnectionLost(String),
    /// The transport's own deadline elapsed before a response arrived.
    Timeout,
    /// The peer or the transport refused the request.
    Rejected(String),
    /// Generic I/O failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Rejected(msg) => write!(f, "Request rejected: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A mechanism to send one encoded wire message and receive the reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
///
/// # invariants
/// - Must return `Ok(fields)` with the response body already split on the
///   message delimiter.
/// - Must return `Err` if the exchange fails; partial responses are
///   failures.
/// - Addressing is the implementation's concern; the core never inspects
///   it.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn request(&self, body: String) -> Result<Vec<String>>;
}
