//! Route table and request dispatch
//!
//! [`ApiRouter`] collects [`Route`]s and the global middleware chain, then
//! mounts everything on an actix `ServiceConfig`. Each route is reachable both
//! at its bare path and under `/v{version}`. The dispatcher renders handler
//! errors: the status comes from the error taxonomy, 5xx bodies are replaced by
//! the reason phrase, and legacy clients get plain text instead of JSON.

use actix_web::http::{Method, StatusCode};
use actix_web::web::{self, Bytes};
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use error_types::http::ErrorBody;
use error_types::{status_from_error, ServiceError};
use std::future::Future;
use std::rc::Rc;

use crate::api::{handler_fn, ApiHandler, ApiMiddleware, ApiRequest, PendingHeaders};
use crate::version::version_less_than;

/// Clients declaring a version below this get plain-text error bodies.
pub const LEGACY_PLAINTEXT_BELOW: &str = "0.1";

const VERSION_PREFIX: &str = "/v{version:[0-9.]+}";

/// One method + path bound to a handler.
pub struct Route {
    method: Method,
    path: String,
    handler: ApiHandler,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: ApiHandler) -> Self {
        Self {
            method,
            path: path.into(),
            handler,
        }
    }

    pub fn get<F, Fut>(path: &str, f: F) -> Self
    where
        F: Fn(ApiRequest) -> Fut + 'static,
        Fut: Future<Output = Result<HttpResponse, ServiceError>> + 'static,
    {
        Self::new(Method::GET, path, handler_fn(f))
    }

    pub fn post<F, Fut>(path: &str, f: F) -> Self
    where
        F: Fn(ApiRequest) -> Fut + 'static,
        Fut: Future<Output = Result<HttpResponse, ServiceError>> + 'static,
    {
        Self::new(Method::POST, path, handler_fn(f))
    }

    pub fn patch<F, Fut>(path: &str, f: F) -> Self
    where
        F: Fn(ApiRequest) -> Fut + 'static,
        Fut: Future<Output = Result<HttpResponse, ServiceError>> + 'static,
    {
        Self::new(Method::PATCH, path, handler_fn(f))
    }

    /// Wrap this route only. Each call wraps the previous result, so the last
    /// wrapper runs first.
    pub fn wrap(mut self, middleware: &dyn ApiMiddleware) -> Self {
        self.handler = middleware.wrap_handler(self.handler);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Route table plus the global middleware chain.
#[derive(Default)]
pub struct ApiRouter {
    middlewares: Vec<Rc<dyn ApiMiddleware>>,
    routes: Vec<Route>,
}

impl ApiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global middleware. The first registered runs outermost and the
    /// last registered runs closest to the handler.
    pub fn middleware(mut self, middleware: impl ApiMiddleware + 'static) -> Self {
        self.middlewares.push(Rc::new(middleware));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    fn build_handler(&self, handler: ApiHandler) -> ApiHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.wrap_handler(next))
    }

    /// Mount all routes. Unsupported methods on a known path answer 404.
    pub fn configure(self, cfg: &mut web::ServiceConfig) {
        let mut by_path: Vec<(String, Vec<(Method, ApiHandler)>)> = Vec::new();
        for route in &self.routes {
            let handler = self.build_handler(route.handler.clone());
            match by_path.iter_mut().find(|(path, _)| *path == route.path) {
                Some((_, methods)) => methods.push((route.method.clone(), handler)),
                None => by_path.push((route.path.clone(), vec![(route.method.clone(), handler)])),
            }
        }

        for (path, methods) in by_path {
            for pattern in [format!("{}{}", VERSION_PREFIX, path), path.clone()] {
                let mut resource = web::resource(pattern).default_service(web::to(not_found));
                for (method, handler) in &methods {
                    let handler = handler.clone();
                    resource = resource.route(web::method(method.clone()).to(
                        move |req: HttpRequest, body: Bytes| dispatch(handler.clone(), req, body),
                    ));
                }
                cfg.service(resource);
            }
        }
    }
}

/// Run a handler chain and render its outcome.
pub async fn dispatch(handler: ApiHandler, req: HttpRequest, body: Bytes) -> HttpResponse {
    let result = handler(ApiRequest::new(req.clone(), body)).await;

    let mut response = match result {
        Ok(response) => response,
        Err(err) => render_error(&req, &err),
    };

    if let Some(pending) = req.extensions_mut().remove::<PendingHeaders>() {
        let headers = response.headers_mut();
        for (name, value) in pending.0 {
            headers.insert(name, value);
        }
    }
    response
}

/// Translate an error into a response.
pub fn render_error(req: &HttpRequest, err: &ServiceError) -> HttpResponse {
    let status = StatusCode::from_u16(status_from_error(err))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status.is_server_error() {
        tracing::error!(
            method = %req.method(),
            path = %req.path(),
            status = status.as_u16(),
            error = ?err,
            "request failed"
        );
        status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_string()
    } else {
        tracing::debug!(
            method = %req.method(),
            path = %req.path(),
            status = status.as_u16(),
            error = %err,
            "request rejected"
        );
        err.to_string()
    };

    let legacy = req
        .match_info()
        .get("version")
        .map(|v| !v.is_empty() && version_less_than(v, LEGACY_PLAINTEXT_BELOW))
        .unwrap_or(false);

    if legacy {
        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .insert_header(("x-content-type-options", "nosniff"))
            .body(format!("{}\n", message))
    } else {
        HttpResponse::build(status).json(ErrorBody::new(message))
    }
}

/// Fallback for unknown paths and unsupported methods.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody::new("page not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use futures::future::ready;
    use std::cell::RefCell;

    use crate::api::HandlerFuture;

    /// Records the order in which middlewares run.
    struct Tag {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ApiMiddleware for Tag {
        fn wrap_handler(&self, next: ApiHandler) -> ApiHandler {
            let name = self.name;
            let log = self.log.clone();
            Rc::new(move |req: ApiRequest| -> HandlerFuture {
                log.borrow_mut().push(name);
                next(req)
            })
        }
    }

    async fn ok(_req: ApiRequest) -> Result<HttpResponse, ServiceError> {
        Ok(HttpResponse::Ok().body("ok"))
    }

    async fn conflict(_req: ApiRequest) -> Result<HttpResponse, ServiceError> {
        Err(ServiceError::conflict("user already exists"))
    }

    async fn broken(_req: ApiRequest) -> Result<HttpResponse, ServiceError> {
        Err(ServiceError::system("connection refused at 10.0.0.3"))
    }

    fn router() -> ApiRouter {
        ApiRouter::new()
            .route(Route::get("/ok", ok))
            .route(Route::post("/conflict", conflict))
            .route(Route::get("/broken", broken))
    }

    #[actix_web::test]
    async fn test_global_middleware_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let router = ApiRouter::new()
            .middleware(Tag { name: "first", log: log.clone() })
            .middleware(Tag { name: "second", log: log.clone() })
            .middleware(Tag { name: "third", log: log.clone() })
            .route(Route::get("/ok", ok));

        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[actix_web::test]
    async fn test_versioned_and_bare_paths() {
        let router = router();
        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;

        for uri in ["/ok", "/v1.0/ok", "/v2/ok"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        }
    }

    #[actix_web::test]
    async fn test_domain_error_rendered_as_json() {
        let router = router();
        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;

        let req = test::TestRequest::post().uri("/conflict").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({ "message": "user already exists" }));
    }

    #[actix_web::test]
    async fn test_server_error_hides_details() {
        let router = router();
        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/broken").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[actix_web::test]
    async fn test_legacy_version_gets_plaintext() {
        let router = router();
        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;

        let req = test::TestRequest::post().uri("/v0.0.5/conflict").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));

        let body = test::read_body(resp).await;
        assert_eq!(body, Bytes::from_static(b"user already exists\n"));
    }

    #[actix_web::test]
    async fn test_unknown_paths_and_methods_are_not_found() {
        let router = router();
        let app = test::init_service(
            App::new()
                .configure(|cfg| router.configure(cfg))
                .default_service(web::to(not_found)),
        )
        .await;

        for req in [
            test::TestRequest::get().uri("/v1.0/nope").to_request(),
            test::TestRequest::get().uri("/nope").to_request(),
            test::TestRequest::delete().uri("/ok").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["message"], "page not found");
        }
    }

    #[actix_web::test]
    async fn test_pending_headers_on_error() {
        struct Stamp;
        impl ApiMiddleware for Stamp {
            fn wrap_handler(&self, next: ApiHandler) -> ApiHandler {
                Rc::new(move |req: ApiRequest| -> HandlerFuture {
                    req.set_response_header(
                        actix_web::http::header::HeaderName::from_static("x-stamp"),
                        actix_web::http::header::HeaderValue::from_static("yes"),
                    );
                    if req.var("version") == Some("9") {
                        return Box::pin(ready(Err(ServiceError::invalid_argument("nope"))));
                    }
                    next(req)
                })
            }
        }

        let router = ApiRouter::new().middleware(Stamp).route(Route::get("/ok", ok));
        let app = test::init_service(App::new().configure(|cfg| router.configure(cfg))).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/v9/ok").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers().get("x-stamp").unwrap(), "yes");

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-stamp").unwrap(), "yes");
    }
}
