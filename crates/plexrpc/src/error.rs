//! # Error Definitions
//!
//! Failures arising from interpreting wire fields. Splitting a raw body
//! into fields never fails; these errors surface only once a payload or
//! frame header is actually read.

/// Protocol interpretation failures.
#[derive(Debug)]
pub enum Error {
    /// A JSON payload field could not be parsed or rendered.
    Json(serde_json::Error),
    /// A message was missing a field its kind requires.
    MissingField { kind: &'static str, field: &'static str },
    /// The kind field named no known message kind.
    UnknownKind(String),
    /// The message body was empty.
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON payload error: {}", e),
            Self::MissingField { kind, field } => {
                write!(f, "'{}' message is missing its '{}' field", kind, field)
            }
            Self::UnknownKind(kind) => write!(f, "Unknown message kind: '{}'", kind),
            Self::Empty => write!(f, "Empty message body"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// A specialized Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
