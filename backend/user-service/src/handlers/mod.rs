/// HTTP handlers
///
/// API handlers take the application state and an [`ApiRequest`] and return
/// `Result<HttpResponse, ServiceError>`; the router renders the errors.
///
/// [`ApiRequest`]: actix_middleware::ApiRequest
pub mod auth;
pub mod health;
pub mod oauth;
pub mod users;
