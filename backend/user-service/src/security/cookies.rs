//! Session and OAuth round-trip cookies.

use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::oauth::pkce::is_valid_code_verifier;

pub const SESSION_COOKIE: &str = "sid";

/// `__Host-` cookies must be Secure, Path=/ and carry no Domain.
pub const OAUTH_TEMP_COOKIE: &str = "__Host-oauth_tmp";
pub const OAUTH_TEMP_TTL_SECS: i64 = 5 * 60;

/// Cookie carrying the raw session token until `expires_at`.
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, token.to_owned())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .finish();
    if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
        cookie.set_expires(at);
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .finish()
}

/// State and PKCE verifier kept across the provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTemp {
    pub state: String,
    pub verifier: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TempCookieError {
    #[error("oauth temp cookie is not valid base64url")]
    Encoding,

    #[error("oauth temp cookie is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid oauth temp cookie")]
    Incomplete,

    #[error("oauth temp cookie carries a malformed code verifier")]
    InvalidVerifier,
}

pub fn oauth_temp_cookie(temp: &OAuthTemp) -> Result<Cookie<'static>, serde_json::Error> {
    let raw = serde_json::to_vec(temp)?;
    Ok(Cookie::build(OAUTH_TEMP_COOKIE, URL_SAFE_NO_PAD.encode(raw))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(OAUTH_TEMP_TTL_SECS))
        .finish())
}

pub fn read_oauth_temp(value: &str) -> Result<OAuthTemp, TempCookieError> {
    let raw = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| TempCookieError::Encoding)?;
    let temp: OAuthTemp = serde_json::from_slice(&raw)?;
    if temp.state.is_empty() || temp.verifier.is_empty() {
        return Err(TempCookieError::Incomplete);
    }
    if !is_valid_code_verifier(&temp.verifier) {
        return Err(TempCookieError::InvalidVerifier);
    }
    Ok(temp)
}

pub fn clear_oauth_temp_cookie() -> Cookie<'static> {
    Cookie::build(OAUTH_TEMP_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_cookie_attributes() {
        let expires_at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let cookie = session_cookie("tok", expires_at, false);

        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.expires_datetime().map(|t| t.unix_timestamp()),
            Some(expires_at.timestamp())
        );

        assert_eq!(session_cookie("tok", expires_at, true).secure(), Some(true));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn test_oauth_temp_cookie_round_trip() {
        let temp = OAuthTemp {
            state: "s".into(),
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into(),
        };
        let cookie = oauth_temp_cookie(&temp).unwrap();
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(CookieDuration::minutes(5)));
        assert_eq!(read_oauth_temp(cookie.value()).unwrap(), temp);
    }

    #[test]
    fn test_oauth_temp_rejects_garbage() {
        assert!(matches!(read_oauth_temp("%%%"), Err(TempCookieError::Encoding)));
        let not_json = URL_SAFE_NO_PAD.encode(b"nope");
        assert!(matches!(read_oauth_temp(&not_json), Err(TempCookieError::Json(_))));
        let empty = URL_SAFE_NO_PAD.encode(br#"{"state":"","verifier":"v"}"#);
        assert!(matches!(read_oauth_temp(&empty), Err(TempCookieError::Incomplete)));
        let short = URL_SAFE_NO_PAD.encode(br#"{"state":"s","verifier":"v"}"#);
        assert!(matches!(read_oauth_temp(&short), Err(TempCookieError::InvalidVerifier)));
    }
}
