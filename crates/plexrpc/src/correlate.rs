//! # Call Correlation
//!
//! Every message carries a (stamp, nonce) pair generated by the requester
//! and echoed verbatim by the responder. The bundled transports are strict
//! request/response and do not need the pair for routing; it is carried so
//! a multiplexed transport can match unordered responses to requests
//! without a protocol change.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const NONCE_LEN: usize = 10;
const NONCE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// The correlation pair stamped onto a request and echoed by its response.
///
/// Both halves are opaque strings on the echo path: a responder copies
/// them back without re-interpreting them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Correlation {
    pub stamp: String,
    pub nonce: String,
}

impl Correlation {
    /// Generates a fresh pair: milliseconds since the Unix epoch plus a
    /// random alphanumeric nonce.
    pub fn next() -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
            .to_string();

        let mut rng = rand::thread_rng();
        let nonce = (0..NONCE_LEN)
            .map(|_| NONCE_CHARS[rng.gen_range(0..NONCE_CHARS.len())] as char)
            .collect();

        Self { stamp, nonce }
    }

    /// Reconstructs the pair a requester sent, for echoing on a response.
    pub fn echo(stamp: &str, nonce: &str) -> Self {
        Self {
            stamp: stamp.to_string(),
            nonce: nonce.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_shape() {
        let corr = Correlation::next();
        assert_eq!(corr.nonce.len(), NONCE_LEN);
        assert!(corr.nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_echo_is_verbatim() {
        let corr = Correlation::echo("1234", "abcDEF0123");
        assert_eq!(corr.stamp, "1234");
        assert_eq!(corr.nonce, "abcDEF0123");
    }
}
