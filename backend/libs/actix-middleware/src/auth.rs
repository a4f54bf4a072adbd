//! Identity-resolving route wrapper
//!
//! Session cookies and bearer tokens differ only in how a credential is read
//! and checked. Both plug into [`RequireIdentity`] through [`IdentityResolver`].
//! Every authentication failure reaches the client as the same 401; the
//! specific cause is only logged.

use async_trait::async_trait;
use error_types::{BoxError, ServiceError};
use std::rc::Rc;

use crate::api::{ApiHandler, ApiMiddleware, ApiRequest, HandlerFuture};

/// Message returned for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "authentication required";

#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    /// No credential was presented.
    #[error("{0} not found in request")]
    Missing(&'static str),

    /// A credential was presented but did not resolve to an identity.
    #[error("credential rejected: {0}")]
    Rejected(#[source] BoxError),

    /// Resolution could not be completed; not the client's fault.
    #[error(transparent)]
    Unavailable(ServiceError),
}

impl AuthFailure {
    pub fn rejected(err: impl Into<BoxError>) -> Self {
        AuthFailure::Rejected(err.into())
    }
}

/// Resolve an identity from a request, or fail.
#[async_trait(?Send)]
pub trait IdentityResolver: 'static {
    type Identity: Clone + 'static;

    /// Credential name used in logs, e.g. "session cookie".
    fn credential(&self) -> &'static str;

    async fn resolve(&self, req: &ApiRequest) -> Result<Self::Identity, AuthFailure>;
}

/// Route wrapper that attaches the resolved identity to the request context.
pub struct RequireIdentity<R> {
    resolver: Rc<R>,
}

impl<R: IdentityResolver> RequireIdentity<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver: Rc::new(resolver),
        }
    }
}

impl<R> Clone for RequireIdentity<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<R: IdentityResolver> ApiMiddleware for RequireIdentity<R> {
    fn wrap_handler(&self, next: ApiHandler) -> ApiHandler {
        let resolver = self.resolver.clone();
        Rc::new(move |req: ApiRequest| -> HandlerFuture {
            let resolver = resolver.clone();
            let next = next.clone();
            Box::pin(async move {
                match resolver.resolve(&req).await {
                    Ok(identity) => {
                        req.insert(identity);
                        next(req).await
                    }
                    Err(AuthFailure::Unavailable(err)) => Err(err),
                    Err(failure) => {
                        tracing::info!(
                            credential = resolver.credential(),
                            path = %req.http().path(),
                            reason = %failure,
                            "authentication failed"
                        );
                        Err(ServiceError::unauthorized(UNAUTHORIZED_MESSAGE))
                    }
                }
            })
        })
    }
}
