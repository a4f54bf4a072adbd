/// OAuth PKCE (Proof Key for Code Exchange), RFC 7636, S256 only.
///
/// 1. Generate a code_verifier (43-128 characters of [A-Za-z0-9._~-])
/// 2. Send code_challenge = BASE64URL(SHA256(code_verifier)) with the authorization request
/// 3. Send the verifier itself with the code exchange
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;

/// Random verifier: 32 bytes, base64url without padding (43 characters).
pub fn generate_code_verifier() -> String {
    random_urlsafe(VERIFIER_BYTES)
}

/// Random opaque value for the `state` parameter.
pub fn generate_state() -> String {
    random_urlsafe(VERIFIER_BYTES)
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn is_valid_code_verifier(verifier: &str) -> bool {
    let len = verifier.len();
    (43..=128).contains(&len)
        && verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// S256 challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
