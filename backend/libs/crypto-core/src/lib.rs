//! Cryptographic primitives shared by the user service.
//!
//! - `token`: session token generation and one-way fingerprints
//! - `jwt`: HS256 bearer token issuance and validation
//! - `hash`: SHA-256 helpers

pub mod hash;
pub mod jwt;
pub mod token;

pub use jwt::{Claims, JwtCodec, JwtError};
pub use token::{SessionToken, TokenFingerprint};
