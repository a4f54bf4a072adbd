//! Bearer token issuance and validation for the OAuth login flow
//!
//! ## Security Design
//!
//! - **HS256 ONLY**: validation pins the algorithm so a token cannot pick its own
//! - **Key id required**: the verification key is looked up strictly by the `kid`
//!   header; tokens without one, or with an unknown one, are rejected
//! - **Stateless**: tokens are never stored and expire by timestamp only
//!
//! ## Usage
//!
//! ```rust
//! use crypto_core::jwt::JwtCodec;
//!
//! let codec = JwtCodec::from_secret(b"change-me").unwrap();
//! let token = codec.issue(7, "Ada", chrono::Utc::now()).unwrap();
//! let claims = codec.validate(&token).unwrap();
//! assert_eq!(JwtCodec::user_id(&claims).unwrap(), 7);
//! ```
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

pub const ISSUER: &str = "userservice";
pub const ACCESS_TOKEN_AUDIENCE: &str = "user.access-token";

/// Identifier of the current signing key.
pub const KEY_ID: &str = "v1";

const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 24;

/// JWT algorithm - the only one accepted on validation
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// Data Structures
// ============================================================================

/// Access token claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as base-10 string)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Display name
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("missing bearer token")]
    MissingBearer,

    #[error("token has no key id")]
    MissingKeyId,

    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    #[error("failed to validate jwt token: {0}")]
    Validation(#[from] jsonwebtoken::errors::Error),

    #[error("user id not found in jwt subject")]
    MalformedSubject,
}

impl JwtError {
    /// True when the signature did not verify.
    pub fn is_invalid_signature(&self) -> bool {
        matches!(
            self,
            JwtError::Validation(e)
                if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::InvalidSignature)
        )
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs with the current key and verifies against a key ring indexed by `kid`.
#[derive(Clone)]
pub struct JwtCodec {
    signing_kid: String,
    signing_key: EncodingKey,
    verifying_keys: HashMap<String, DecodingKey>,
}

impl JwtCodec {
    /// Build a codec whose only key is `v1`, derived from a shared secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::EmptySecret);
        }

        let mut verifying_keys = HashMap::new();
        verifying_keys.insert(KEY_ID.to_string(), DecodingKey::from_secret(secret));

        Ok(Self {
            signing_kid: KEY_ID.to_string(),
            signing_key: EncodingKey::from_secret(secret),
            verifying_keys,
        })
    }

    /// Issue an access token for `user_id`, valid for 24 hours from `now`.
    pub fn issue(&self, user_id: i64, name: &str, now: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iss: ISSUER.to_string(),
            aud: ACCESS_TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS)).timestamp(),
            name: name.to_string(),
        };

        let mut header = Header::new(JWT_ALGORITHM);
        header.kid = Some(self.signing_kid.clone());

        Ok(encode(&header, &claims, &self.signing_key)?)
    }

    /// Validate a compact token: key id lookup, signature, issuer, audience, expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "jwt rejected");
            e
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(JwtError::MissingKeyId)?;
        let key = self
            .verifying_keys
            .get(&kid)
            .ok_or_else(|| JwtError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[ACCESS_TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(decode::<Claims>(token, key, &validation)?.claims)
    }

    /// Validate the value of an `Authorization` header.
    pub fn validate_authorization(&self, header: Option<&str>) -> Result<Claims, JwtError> {
        let token = extract_bearer(header)?;
        self.validate(token)
    }

    /// Parse the subject claim as a user id.
    pub fn user_id(claims: &Claims) -> Result<i64, JwtError> {
        claims
            .sub
            .parse::<i64>()
            .map_err(|_| JwtError::MalformedSubject)
    }
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("signing_kid", &self.signing_kid)
            .field("verifying_kids", &self.verifying_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Strip the `Bearer` scheme (case-insensitive) from an `Authorization` value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, JwtError> {
    let value = header.ok_or(JwtError::MissingBearer)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(JwtError::MissingBearer)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(JwtError::MissingBearer);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(JwtError::MissingBearer);
    }
    Ok(token)
}

// ============================================================================
// Tests
// ============================================================================
