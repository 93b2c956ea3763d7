//! # PlexRPC
//!
//! The wire protocol for plexus services: six newline-delimited message
//! kinds carrying a correlation pair and JSON-shaped payloads.
//!
//! ## Architecture
//!
//! A message is an ordered sequence of string fields joined by `'\n'`.
//! Field 0 names the kind, fields 1-2 are the correlation pair, and the
//! remaining fields are kind-specific. Every variable-length field is
//! JSON-encoded before it is placed into the message, so the delimiter
//! never needs in-band escaping.
//!
//! Splitting a body into fields cannot fail; interpreting those fields
//! can, and every interpretation path returns a `Result`.

pub mod correlate;
pub mod error;
pub mod listing;
pub mod message;

#[cfg(test)]
mod tests;

pub use correlate::Correlation;
pub use error::{Error, Result};
pub use listing::{Listing, ListingNode};
pub use message::{
    CallEncoder, ErrEncoder, ExitEncoder, Frame, InitEncoder, LsEncoder, ResEncoder, split_fields,
};
