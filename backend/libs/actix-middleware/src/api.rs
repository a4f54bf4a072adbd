//! Handler signature shared by every API route
//!
//! An [`ApiHandler`] takes an [`ApiRequest`] and resolves to either a response
//! or a classified [`ServiceError`]. Middlewares are decorators over that one
//! signature (see [`ApiMiddleware`]); rendering errors is left to the dispatcher.

use actix_web::cookie::Cookie;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::web::{Bytes, Query};
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use error_types::ServiceError;
use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::rc::Rc;

pub type HandlerFuture = LocalBoxFuture<'static, Result<HttpResponse, ServiceError>>;

pub type ApiHandler = Rc<dyn Fn(ApiRequest) -> HandlerFuture>;

/// Decorator over [`ApiHandler`].
pub trait ApiMiddleware {
    fn wrap_handler(&self, next: ApiHandler) -> ApiHandler;
}

/// Box an async function into an [`ApiHandler`].
pub fn handler_fn<F, Fut>(f: F) -> ApiHandler
where
    F: Fn(ApiRequest) -> Fut + 'static,
    Fut: Future<Output = Result<HttpResponse, ServiceError>> + 'static,
{
    Rc::new(move |req: ApiRequest| -> HandlerFuture { Box::pin(f(req)) })
}

/// Headers queued by middlewares, applied to whatever response is finally rendered.
#[derive(Default)]
pub(crate) struct PendingHeaders(pub(crate) Vec<(HeaderName, HeaderValue)>);

/// Request as seen by API handlers: the routed request, its body and a typed context.
#[derive(Clone)]
pub struct ApiRequest {
    http: HttpRequest,
    body: Bytes,
}

impl ApiRequest {
    pub fn new(http: HttpRequest, body: Bytes) -> Self {
        Self { http, body }
    }

    pub fn http(&self) -> &HttpRequest {
        &self.http
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Route variable, e.g. `version` for `/v{version}/...`.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.http.match_info().get(name)
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.http
            .headers()
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.http.cookie(name)
    }

    /// True when the listener serving this request terminates TLS.
    pub fn is_tls(&self) -> bool {
        self.http.app_config().secure()
    }

    /// Decode a JSON body. Malformed input is an invalid-argument error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ServiceError::invalid_argument(format!("invalid request body: {}", e)))
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        Query::<T>::from_query(self.http.query_string())
            .map(Query::into_inner)
            .map_err(|e| ServiceError::invalid_argument(format!("invalid query: {}", e)))
    }

    /// Attach a typed value to the request context.
    pub fn insert<T: 'static>(&self, value: T) {
        self.http.extensions_mut().insert(value);
    }

    /// Typed context lookup. `None` when nothing of that type was attached.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.http.extensions().get::<T>().cloned()
    }

    /// Context value that an auth middleware must have attached.
    pub fn identity<T: Clone + 'static>(&self) -> Result<T, ServiceError> {
        self.get::<T>()
            .ok_or_else(|| ServiceError::unauthorized("identity not found in request context"))
    }

    /// Queue a header for the final response, success or error.
    pub fn set_response_header(&self, name: HeaderName, value: HeaderValue) {
        let mut extensions = self.http.extensions_mut();
        if let Some(pending) = extensions.get_mut::<PendingHeaders>() {
            pending.0.push((name, value));
        } else {
            extensions.insert(PendingHeaders(vec![(name, value)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(u32);

    #[derive(Debug, Deserialize)]
    struct Body {
        name: String,
    }

    #[test]
    fn test_typed_context_roundtrip() {
        let req = ApiRequest::new(TestRequest::default().to_http_request(), Bytes::new());
        assert_eq!(req.get::<Marker>(), None);
        assert!(req.identity::<Marker>().is_err());

        req.insert(Marker(7));
        assert_eq!(req.get::<Marker>(), Some(Marker(7)));
        assert_eq!(req.identity::<Marker>().unwrap(), Marker(7));
    }

    #[test]
    fn test_json_errors_are_invalid_argument() {
        let req = ApiRequest::new(
            TestRequest::default().to_http_request(),
            Bytes::from_static(b"{not json"),
        );
        let err = req.json::<Body>().unwrap_err();
        assert_eq!(err.status_code(), 400);

        let req = ApiRequest::new(
            TestRequest::default().to_http_request(),
            Bytes::from_static(br#"{"name":"ada"}"#),
        );
        assert_eq!(req.json::<Body>().unwrap().name, "ada");
    }

    #[test]
    fn test_pending_headers_accumulate() {
        let req = ApiRequest::new(TestRequest::default().to_http_request(), Bytes::new());
        req.set_response_header(
            HeaderName::from_static("a"),
            HeaderValue::from_static("1"),
        );
        req.set_response_header(
            HeaderName::from_static("b"),
            HeaderValue::from_static("2"),
        );
        let ext = req.http().extensions();
        let pending = ext.get::<PendingHeaders>().unwrap();
        assert_eq!(pending.0.len(), 2);
    }
}
