//! Session tokens and their fingerprints
//!
//! A session token is the only secret a browser holds for its session. The
//! server never keeps the raw value: storage and the in-process cache are both
//! keyed by the SHA-256 fingerprint of the token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

use crate::hash::sha256;

/// Random bytes per token (256 bits of entropy).
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Raw session token as handed to the client.
///
/// `Debug` is redacted so the value never lands in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token presented by a client (cookie value).
    pub fn from_presented(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> TokenFingerprint {
        TokenFingerprint::of(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// One-way 256-bit digest of a session token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenFingerprint([u8; 32]);

impl TokenFingerprint {
    pub fn of(token: &str) -> Self {
        Self(sha256(token.as_bytes()))
    }

    /// Rebuild a fingerprint loaded from storage. Returns `None` on a width mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Prefix is enough to correlate log lines.
        write!(f, "TokenFingerprint({}…)", &self.to_hex()[..12])
    }
}
