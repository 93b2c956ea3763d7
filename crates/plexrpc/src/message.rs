//! # Wire Messages
//!
//! Encoders for the six message kinds and the classifier for inbound
//! fields.
//!
//! ## Invariants
//!
//! - Encoding is an append-only join over the field delimiter; every
//!   variable-length payload is JSON text before it enters a field, so a
//!   newline inside an argument survives inside its escaped JSON string.
//! - `split_fields` never fails. `Frame::parse` classifies split fields
//!   and fails only on kinds or shapes it cannot interpret; callers
//!   handle those defensively.

use serde_json::Value;

use crate::correlate::Correlation;
use crate::error::{Error, Result};

/// The field delimiter separating message fields on the wire.
pub const DELIMITER: char = '\n';

pub mod kind {
    pub const LS: &str = "ls";
    pub const INIT: &str = "init";
    pub const CALL: &str = "call";
    pub const RES: &str = "res";
    pub const ERR: &str = "err";
    pub const EXIT: &str = "exit";
}

/// Splits a raw message body into its fields. Total: any input yields at
/// least one field.
pub fn split_fields(body: &str) -> Vec<String> {
    body.split(DELIMITER).map(str::to_string).collect()
}

fn join(fields: &[&str]) -> String {
    fields.join("\n")
}

/// Encodes an `ls` listing request with a fresh correlation pair.
pub struct LsEncoder {
    pub correlation: Correlation,
}

impl LsEncoder {
    pub fn new() -> Self {
        Self {
            correlation: Correlation::next(),
        }
    }

    pub fn encode(&self) -> String {
        join(&[kind::LS, &self.correlation.stamp, &self.correlation.nonce])
    }
}

impl Default for LsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes an `init` listing response.
///
/// Takes the listing body pre-rendered: a server computes its listing
/// JSON once at bind time and reuses it for every `ls` it answers.
pub struct InitEncoder<'a> {
    pub correlation: Correlation,
    pub listing_json: &'a str,
}

impl<'a> InitEncoder<'a> {
    pub fn new(correlation: Correlation, listing_json: &'a str) -> Self {
        Self {
            correlation,
            listing_json,
        }
    }

    pub fn encode(&self) -> String {
        join(&[
            kind::INIT,
            &self.correlation.stamp,
            &self.correlation.nonce,
            self.listing_json,
        ])
    }
}

/// Encodes a `call` invocation.
///
/// The implicit-context field is taken pre-rendered (or omitted entirely)
/// because callers cache it: a proxy view's context is immutable for the
/// view's lifetime, so its JSON is computed at most once.
pub struct CallEncoder<'a> {
    pub correlation: Correlation,
    pub path: &'a str,
    pub args: &'a [Value],
    pub implicits_json: Option<&'a str>,
}

impl<'a> CallEncoder<'a> {
    pub fn new(path: &'a str, args: &'a [Value], implicits_json: Option<&'a str>) -> Self {
        Self {
            correlation: Correlation::next(),
            path,
            args,
            implicits_json,
        }
    }

    pub fn encode(&self) -> String {
        let args = Value::Array(self.args.to_vec()).to_string();
        join(&[
            kind::CALL,
            &self.correlation.stamp,
            &self.correlation.nonce,
            self.path,
            &args,
            self.implicits_json.unwrap_or(""),
        ])
    }
}

/// Encodes a `res` success response.
pub struct ResEncoder<'a> {
    pub correlation: Correlation,
    pub value: &'a Value,
}

impl<'a> ResEncoder<'a> {
    pub fn new(correlation: Correlation, value: &'a Value) -> Self {
        Self { correlation, value }
    }

    pub fn encode(&self) -> String {
        join(&[
            kind::RES,
            &self.correlation.stamp,
            &self.correlation.nonce,
            &self.value.to_string(),
        ])
    }
}

/// Encodes an `err` failure response.
pub struct ErrEncoder<'a> {
    pub correlation: Correlation,
    pub payload: &'a Value,
}

impl<'a> ErrEncoder<'a> {
    pub fn new(correlation: Correlation, payload: &'a Value) -> Self {
        Self {
            correlation,
            payload,
        }
    }

    /// Convenience for the common case of a bare message string.
    pub fn encode_message(correlation: Correlation, message: &str) -> String {
        let payload = Value::String(message.to_string());
        ErrEncoder {
            correlation,
            payload: &payload,
        }
        .encode()
    }

    pub fn encode(&self) -> String {
        join(&[
            kind::ERR,
            &self.correlation.stamp,
            &self.correlation.nonce,
            &self.payload.to_string(),
        ])
    }
}

/// Encodes an `exit` termination response.
///
/// Always emits the `exit` kind, whatever the reason or correlation. An
/// earlier revision of the protocol leaked the `err` kind on this path;
/// peers speaking that revision are not supported.
pub struct ExitEncoder<'a> {
    pub correlation: Correlation,
    pub reason: &'a Value,
}

impl<'a> ExitEncoder<'a> {
    pub fn new(correlation: Correlation, reason: &'a Value) -> Self {
        Self {
            correlation,
            reason,
        }
    }

    pub fn encode(&self) -> String {
        join(&[
            kind::EXIT,
            &self.correlation.stamp,
            &self.correlation.nonce,
            &self.reason.to_string(),
        ])
    }
}

/// A classified inbound message, borrowing the split fields it came from.
///
/// Payload fields stay as raw JSON text; the caller decides when (and
/// whether) to interpret them.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Ls {
        stamp: &'a str,
        nonce: &'a str,
    },
    Init {
        stamp: &'a str,
        nonce: &'a str,
        listing: &'a str,
    },
    Call {
        stamp: &'a str,
        nonce: &'a str,
        path: &'a str,
        args: &'a str,
        implicits: Option<&'a str>,
    },
    Res {
        stamp: &'a str,
        nonce: &'a str,
        payload: &'a str,
    },
    Err {
        stamp: &'a str,
        nonce: &'a str,
        payload: &'a str,
    },
    Exit {
        stamp: &'a str,
        nonce: &'a str,
        reason: Option<&'a str>,
    },
}

impl<'a> Frame<'a> {
    /// Classifies split fields into a frame.
    ///
    /// Missing correlation fields degrade to empty strings (they are
    /// opaque echoes); a missing kind-specific payload is an error the
    /// caller answers defensively.
    pub fn parse(fields: &'a [String]) -> Result<Self> {
        let kind = fields.first().map(String::as_str).ok_or(Error::Empty)?;
        let stamp = field(fields, 1).unwrap_or("");
        let nonce = field(fields, 2).unwrap_or("");

        match kind {
            kind::LS => Ok(Frame::Ls { stamp, nonce }),
            kind::INIT => Ok(Frame::Init {
                stamp,
                nonce,
                listing: require(fields, 3, kind::INIT, "listing")?,
            }),
            kind::CALL => Ok(Frame::Call {
                stamp,
                nonce,
                path: require(fields, 3, kind::CALL, "path")?,
                args: require(fields, 4, kind::CALL, "args")?,
                implicits: field(fields, 5).filter(|s| !s.is_empty()),
            }),
            kind::RES => Ok(Frame::Res {
                stamp,
                nonce,
                payload: require(fields, 3, kind::RES, "payload")?,
            }),
            kind::ERR => Ok(Frame::Err {
                stamp,
                nonce,
                payload: require(fields, 3, kind::ERR, "payload")?,
            }),
            kind::EXIT => Ok(Frame::Exit {
                stamp,
                nonce,
                reason: field(fields, 3).filter(|s| !s.is_empty()),
            }),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }

    /// The correlation pair this frame carries.
    pub fn correlation(&self) -> Correlation {
        let (stamp, nonce) = match self {
            Frame::Ls { stamp, nonce } => (stamp, nonce),
            Frame::Init { stamp, nonce, .. } => (stamp, nonce),
            Frame::Call { stamp, nonce, .. } => (stamp, nonce),
            Frame::Res { stamp, nonce, .. } => (stamp, nonce),
            Frame::Err { stamp, nonce, .. } => (stamp, nonce),
            Frame::Exit { stamp, nonce, .. } => (stamp, nonce),
        };
        Correlation::echo(stamp, nonce)
    }
}

fn field(fields: &[String], at: usize) -> Option<&str> {
    fields.get(at).map(String::as_str)
}

fn require<'a>(
    fields: &'a [String],
    at: usize,
    kind: &'static str,
    name: &'static str,
) -> Result<&'a str> {
    field(fields, at).ok_or(Error::MissingField { kind, field: name })
}
