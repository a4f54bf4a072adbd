use actix_web::http::header::AUTHORIZATION;
use async_trait::async_trait;
use crypto_core::jwt::{JwtCodec, JwtError};
use std::sync::Arc;

use crate::api::ApiRequest;
use crate::auth::{AuthFailure, IdentityResolver, RequireIdentity};

/// User ID extracted from a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub i64);

/// Resolves `Authorization: Bearer <jwt>` into a [`UserId`].
#[derive(Clone)]
pub struct BearerTokenResolver {
    codec: Arc<JwtCodec>,
}

impl BearerTokenResolver {
    pub fn new(codec: Arc<JwtCodec>) -> Self {
        Self { codec }
    }
}

#[async_trait(?Send)]
impl IdentityResolver for BearerTokenResolver {
    type Identity = UserId;

    fn credential(&self) -> &'static str {
        "bearer token"
    }

    async fn resolve(&self, req: &ApiRequest) -> Result<UserId, AuthFailure> {
        let header = req.header(AUTHORIZATION);
        if header.is_none() {
            return Err(AuthFailure::Missing("authorization header"));
        }

        let claims = self
            .codec
            .validate_authorization(header)
            .map_err(AuthFailure::rejected)?;

        match JwtCodec::user_id(&claims) {
            Ok(id) => Ok(UserId(id)),
            Err(e @ JwtError::MalformedSubject) => {
                tracing::error!(subject = %claims.sub, "validated token carries a non-numeric subject");
                Err(AuthFailure::rejected(e))
            }
            Err(e) => Err(AuthFailure::rejected(e)),
        }
    }
}

/// JWT Authentication Middleware
pub type JwtAuthMiddleware = RequireIdentity<BearerTokenResolver>;

impl JwtAuthMiddleware {
    pub fn bearer(codec: Arc<JwtCodec>) -> Self {
        RequireIdentity::new(BearerTokenResolver::new(codec))
    }
}
