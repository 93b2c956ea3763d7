//! # Session Client
//!
//! Negotiates a procedure listing from a peer and mirrors it locally:
//! every listed leaf becomes a callable that forwards over the transport.
//!
//! ## Architecture
//!
//! - **Negotiation**: one `ls` request, answered by `init`, classified
//!   defensively. The listing is pre-indexed into a dot-path table so a
//!   call never walks the tree.
//! - **Views**: `implicitly` derives a new view carrying extra context;
//!   all views share one `Connection`. Deriving never mutates the parent.
//! - **Connection state**: a single shared ended flag. Once the peer
//!   pushes `exit` (or `end` is called locally), every view rejects
//!   further calls without touching the transport.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{debug, warn};

use plexrpc::{CallEncoder, Frame, Listing, LsEncoder};

use crate::remote::{CallError, Remote};
use crate::transport::{self, Transport};

/// Failures establishing a session, before any proxy exists.
#[derive(Debug)]
pub enum NegotiateError {
    /// The transport failed; propagated verbatim.
    Transport(transport::Error),
    /// The peer answered the listing request with `err`, `exit`, or
    /// something the protocol does not allow there.
    Unavailable(String),
    /// The listing payload was not valid JSON.
    Parse(plexrpc::Error),
}

impl std::fmt::Display for NegotiateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{}", e),
            Self::Unavailable(msg) => write!(f, "{}", msg),
            Self::Parse(e) => write!(f, "JSON parser error: {}", e),
        }
    }
}

impl std::error::Error for NegotiateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<transport::Error> for NegotiateError {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

type EndHandler = Arc<dyn Fn() + Send + Sync>;
type ExitHandler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&CallError) + Send + Sync>;

#[derive(Clone, Default)]
struct Observers {
    end: Option<EndHandler>,
    exit: Option<ExitHandler>,
    error: Option<ErrorHandler>,
}

/// Session options: observers for connection-lifecycle events.
#[derive(Clone, Default)]
pub struct ClientOptions {
    observers: Observers,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the connection ends, whether by a peer-pushed `exit`
    /// or a local `end`.
    pub fn on_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.observers.end = Some(Arc::new(f));
        self
    }

    /// Called when the peer pushes `exit`, with the transmitted reason.
    pub fn on_exit(mut self, f: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.observers.exit = Some(Arc::new(f));
        self
    }

    /// Broadcast observer for failed calls: remote `err` responses and
    /// transport failures, in addition to the per-call error return.
    pub fn on_error(mut self, f: impl Fn(&CallError) + Send + Sync + 'static) -> Self {
        self.observers.error = Some(Arc::new(f));
        self
    }
}

/// State shared by every view derived from one negotiation.
struct Connection {
    transport: Arc<dyn Transport>,
    listing: Listing,
    procedures: HashMap<String, usize>,
    ended: AtomicBool,
    observers: Observers,
}

impl Connection {
    fn broadcast(&self, err: &CallError) {
        if let Some(on_error) = &self.observers.error {
            on_error(err);
        }
    }
}

/// Extracts a human-readable message from an error/exit payload: a JSON
/// string decodes to itself, any other JSON renders compactly, and
/// unparseable payloads pass through raw.
fn payload_message(payload: &str) -> String {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => payload.to_string(),
    }
}

/// Negotiates a session: requests the peer's listing and builds the root
/// proxy view from it.
///
/// Transport failures propagate verbatim. An `err` or `exit` answer, or
/// any other unexpected kind, surfaces as a single listing-unavailable
/// failure; a listing that does not parse surfaces as a parse failure.
pub async fn negotiate(
    transport: Arc<dyn Transport>,
    options: ClientOptions,
) -> std::result::Result<Proxy, NegotiateError> {
    let fields = transport.request(LsEncoder::new().encode()).await?;

    match Frame::parse(&fields) {
        Ok(Frame::Init { listing, .. }) => {
            let listing = Listing::from_json(listing).map_err(NegotiateError::Parse)?;
            let procedures: HashMap<String, usize> = listing.paths().into_iter().collect();
            debug!(procedures = procedures.len(), "negotiated listing");

            Ok(Proxy {
                conn: Arc::new(Connection {
                    transport,
                    listing,
                    procedures,
                    ended: AtomicBool::new(false),
                    observers: options.observers,
                }),
                implicits: BTreeMap::new(),
                implicits_json: OnceLock::new(),
            })
        }
        Ok(Frame::Err { payload, .. }) => Err(NegotiateError::Unavailable(payload_message(payload))),
        Ok(Frame::Exit { reason, .. }) => Err(NegotiateError::Unavailable(
            reason
                .map(payload_message)
                .unwrap_or_else(|| "Error requesting procedure listing".to_string()),
        )),
        _ => Err(NegotiateError::Unavailable(
            "Unexpected response to listing request".to_string(),
        )),
    }
}

/// One view of a negotiated session.
///
/// Views are cheap: deriving one with [`Proxy::implicitly`] shares the
/// connection and copies only the context map. The context is immutable
/// for a view's lifetime, so its JSON encoding is computed at most once.
#[derive(Clone)]
pub struct Proxy {
    conn: Arc<Connection>,
    implicits: BTreeMap<String, Value>,
    implicits_json: OnceLock<String>,
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("implicits", &self.implicits)
            .finish_non_exhaustive()
    }
}

impl Proxy {
    /// The negotiated listing this proxy mirrors.
    pub fn listing(&self) -> &Listing {
        &self.conn.listing
    }

    /// Declared arity of the procedure at `path`, if the peer listed one.
    pub fn arity(&self, path: &str) -> Option<usize> {
        self.conn.procedures.get(path).copied()
    }

    /// Whether the connection has ended.
    pub fn ended(&self) -> bool {
        self.conn.ended.load(Ordering::SeqCst)
    }

    /// Derives a new view with `value` merged under `key`. The receiver
    /// is left untouched; both views keep calling over the same
    /// connection.
    pub fn implicitly(&self, key: impl Into<String>, value: Value) -> Proxy {
        let mut implicits = self.implicits.clone();
        implicits.insert(key.into(), value);
        Proxy {
            conn: self.conn.clone(),
            implicits,
            implicits_json: OnceLock::new(),
        }
    }

    /// Ends the connection locally, without waiting for a server-pushed
    /// `exit`. Every view derived from this connection fails fast from
    /// now on.
    pub fn end(&self) {
        self.conn.ended.store(true, Ordering::SeqCst);
        if let Some(on_end) = &self.conn.observers.end {
            on_end();
        }
    }

    fn implicits_json(&self) -> Option<&str> {
        if self.implicits.is_empty() {
            return None;
        }
        let json = self
            .implicits_json
            .get_or_init(|| serde_json::to_string(&self.implicits).unwrap_or_else(|_| "{}".into()));
        Some(json.as_str())
    }

    /// Invokes the remote procedure at `path`.
    pub async fn invoke(&self, path: &str, args: Vec<Value>) -> crate::remote::Result<Value> {
        if self.ended() {
            return Err(CallError::Closed);
        }
        if !self.conn.procedures.contains_key(path) {
            return Err(CallError::NoSuchProcedure(path.to_string()));
        }

        let body = CallEncoder::new(path, &args, self.implicits_json()).encode();
        let fields = match self.conn.transport.request(body).await {
            Ok(fields) => fields,
            Err(e) => {
                let err = CallError::Transport(e);
                self.conn.broadcast(&err);
                return Err(err);
            }
        };

        match Frame::parse(&fields) {
            Ok(Frame::Res { payload, .. }) => {
                serde_json::from_str(payload).map_err(|e| CallError::Codec(e.to_string()))
            }
            Ok(Frame::Err { payload, .. }) => {
                let err = CallError::Remote(payload_message(payload));
                self.conn.broadcast(&err);
                Err(err)
            }
            Ok(Frame::Exit { reason, .. }) => {
                warn!(path, "peer pushed exit; connection ended");
                let reason_value = reason.and_then(|r| serde_json::from_str::<Value>(r).ok());
                if !self.conn.ended.swap(true, Ordering::SeqCst) {
                    if let Some(on_exit) = &self.conn.observers.exit {
                        on_exit(reason_value.as_ref());
                    }
                    if let Some(on_end) = &self.conn.observers.end {
                        on_end();
                    }
                }
                Err(CallError::Closed)
            }
            Ok(other) => Err(CallError::Protocol(format!(
                "Unexpected response to call: {:?}",
                other
            ))),
            Err(e) => Err(CallError::Protocol(e.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl Remote for Proxy {
    fn arity(&self, path: &str) -> Option<usize> {
        Proxy::arity(self, path)
    }

    async fn invoke(&self, path: &str, args: Vec<Value>) -> crate::remote::Result<Value> {
        Proxy::invoke(self, path, args).await
    }
}
