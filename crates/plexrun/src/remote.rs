//! # Callable Surfaces
//!
//! `Remote` is the uniform surface a dependency presents to the service
//! that consumes it: nested, dot-addressed procedures invoked
//! asynchronously. The session client's proxy implements it over a
//! transport; the mock harness implements it over an in-process tree.
//! Service factories only ever see the trait, so a locally defined
//! service can stand in wherever a network-backed proxy is expected.

use serde_json::Value;

use crate::transport;

/// Failures from invoking a procedure through a callable surface.
#[derive(Debug)]
pub enum CallError {
    /// The connection is closed; no request was attempted.
    Closed,
    /// No procedure lives at the given dot-path.
    NoSuchProcedure(String),
    /// The peer answered with an `err` response carrying this message.
    Remote(String),
    /// The transport failed; propagated verbatim.
    Transport(transport::Error),
    /// A payload could not be encoded or decoded.
    Codec(String),
    /// The peer answered with a message the protocol does not allow here.
    Protocol(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Connection is closed"),
            Self::NoSuchProcedure(path) => write!(f, "Procedure {} does not exist", path),
            Self::Remote(message) => write!(f, "{}", message),
            Self::Transport(e) => write!(f, "{}", e),
            Self::Codec(msg) => write!(f, "Codec error: {}", msg),
            Self::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<transport::Error> for CallError {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, CallError>;

impl std::fmt::Debug for dyn Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Remote")
    }
}

/// A set of callable procedures addressed by dot-path.
#[async_trait::async_trait]
pub trait Remote: Send + Sync {
    /// Declared arity of the procedure at `path`, if one exists.
    fn arity(&self, path: &str) -> Option<usize>;

    /// Invokes the procedure at `path` with positional arguments.
    async fn invoke(&self, path: &str, args: Vec<Value>) -> Result<Value>;
}
