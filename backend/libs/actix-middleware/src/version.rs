//! API version negotiation
//!
//! Routes are mounted under `/v{version}` as well as unprefixed. The version
//! middleware stamps the server identity headers on every response, rejects
//! versions outside `[min, default]` and attaches the accepted [`ApiVersion`]
//! to the request context.

use actix_web::http::header::{HeaderName, HeaderValue};
use error_types::ServiceError;
use futures::future::ready;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::api::{ApiHandler, ApiMiddleware, ApiRequest, HandlerFuture};

pub const API_VERSION_HEADER: &str = "api-version";
pub const OS_TYPE_HEADER: &str = "ostype";

/// Compare dotted numeric versions segment by segment.
///
/// Missing or non-numeric segments count as zero, so `"1"` equals `"1.0"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        let r = right.get(i).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn version_less_than(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Less
}

/// Negotiated API version, available to handlers through the request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion(pub String);

impl ApiVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("client version {requested} is too old. Minimum supported API version is {minimum}, please upgrade your client")]
    TooOld { requested: String, minimum: String },

    #[error("client version {requested} is too new. Maximum supported API version is {maximum}")]
    TooNew { requested: String, maximum: String },
}

impl From<VersionError> for ServiceError {
    fn from(err: VersionError) -> Self {
        ServiceError::invalid_argument(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionConfigError {
    #[error("{0} API version must be set")]
    MissingBound(&'static str),

    #[error("default API version {default} is lower than minimum {minimum}")]
    DefaultBelowMinimum { default: String, minimum: String },
}

struct Negotiator {
    default_version: String,
    min_version: String,
    server_header: HeaderValue,
    default_header: HeaderValue,
    os_header: HeaderValue,
}

/// Middleware negotiating the API version of each request.
#[derive(Clone)]
pub struct VersionMiddleware {
    inner: Rc<Negotiator>,
}

impl VersionMiddleware {
    pub fn new(
        server_version: &str,
        default_version: &str,
        min_version: &str,
    ) -> Result<Self, VersionConfigError> {
        if default_version.trim().is_empty() {
            return Err(VersionConfigError::MissingBound("default"));
        }
        if min_version.trim().is_empty() {
            return Err(VersionConfigError::MissingBound("minimum"));
        }
        if version_less_than(default_version, min_version) {
            return Err(VersionConfigError::DefaultBelowMinimum {
                default: default_version.to_string(),
                minimum: min_version.to_string(),
            });
        }

        let os = std::env::consts::OS;
        let header = |value: String| {
            HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        };

        Ok(Self {
            inner: Rc::new(Negotiator {
                default_version: default_version.to_string(),
                min_version: min_version.to_string(),
                server_header: header(format!("user-service/{} ({})", server_version, os)),
                default_header: header(default_version.to_string()),
                os_header: header(os.to_string()),
            }),
        })
    }

    /// Check a requested version against the supported range.
    pub fn negotiate(&self, requested: Option<&str>) -> Result<ApiVersion, VersionError> {
        let requested = match requested {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(ApiVersion(self.inner.default_version.clone())),
        };

        if version_less_than(requested, &self.inner.min_version) {
            return Err(VersionError::TooOld {
                requested: requested.to_string(),
                minimum: self.inner.min_version.clone(),
            });
        }
        if version_less_than(&self.inner.default_version, requested) {
            return Err(VersionError::TooNew {
                requested: requested.to_string(),
                maximum: self.inner.default_version.clone(),
            });
        }
        Ok(ApiVersion(requested.to_string()))
    }

    fn stamp_headers(&self, req: &ApiRequest) {
        req.set_response_header(
            actix_web::http::header::SERVER,
            self.inner.server_header.clone(),
        );
        req.set_response_header(
            HeaderName::from_static(API_VERSION_HEADER),
            self.inner.default_header.clone(),
        );
        req.set_response_header(
            HeaderName::from_static(OS_TYPE_HEADER),
            self.inner.os_header.clone(),
        );
    }
}

impl ApiMiddleware for VersionMiddleware {
    fn wrap_handler(&self, next: ApiHandler) -> ApiHandler {
        let this = self.clone();
        Rc::new(move |req: ApiRequest| -> HandlerFuture {
            this.stamp_headers(&req);
            match this.negotiate(req.var("version")) {
                Ok(version) => {
                    req.insert(version);
                    next(req)
                }
                Err(err) => Box::pin(ready(Err(err.into()))),
            }
        })
    }
}
