//! # Actix Middleware Library
//!
//! Request pipeline for the user service API
//!
//! ## Modules
//! - `api`: handler signature, request context and the middleware trait
//! - `router`: route table, versioned mounting and error rendering
//! - `version`: API version negotiation
//! - `auth`: identity-resolving route wrapper
//! - `jwt_auth`: bearer token resolver
//! - `recovery`: panic recovery
//! - `logging`: access log
//! - `correlation_id`: request ids

pub mod api;
pub mod auth;
pub mod correlation_id;
pub mod jwt_auth;
pub mod logging;
pub mod recovery;
pub mod router;
pub mod version;

pub use api::{handler_fn, ApiHandler, ApiMiddleware, ApiRequest, HandlerFuture};
pub use auth::{AuthFailure, IdentityResolver, RequireIdentity};
pub use correlation_id::{CorrelationIdMiddleware, RequestId};
pub use jwt_auth::{BearerTokenResolver, JwtAuthMiddleware, UserId};
pub use logging::Logging;
pub use recovery::Recovery;
pub use router::{dispatch, not_found, render_error, ApiRouter, Route};
pub use version::{ApiVersion, VersionConfigError, VersionError, VersionMiddleware};
