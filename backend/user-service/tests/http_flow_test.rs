/// End-to-end HTTP tests against the in-memory driver
use actix_middleware::not_found;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::TokenFingerprint;
use serde_json::{json, Value};
use std::sync::Arc;

use user_service::clock::SystemClock;
use user_service::models::{NewSession, Session};
use user_service::routes;
use user_service::store::{MemoryStore, SessionStore, StoreError};
use user_service::{AppState, Config};

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .configure(routes::configure($state.clone()))
                .default_service(web::to(not_found)),
        )
        .await
    };
}

fn state() -> AppState {
    AppState::in_memory(Config::memory("test-secret"), Arc::new(SystemClock))
        .expect("memory state")
}

fn sid<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "sid")
        .map(|c| c.into_owned())
}

fn credentials(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password })
}

#[actix_web::test]
async fn test_signup_me_logout_me() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(credentials(" Ada@Example.com ", "correct horse"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie = sid(&resp).expect("session cookie");
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.http_only(), Some(true));
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["email"], "ada@example.com");
    assert!(user.get("password_hash").is_none());

    let req = test::TestRequest::get()
        .uri("/user/me")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["id"], user["id"]);

    let req = test::TestRequest::get()
        .uri("/auth/logout")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(sid(&resp).map(|c| c.value().to_string()), Some(String::new()));

    let req = test::TestRequest::get()
        .uri("/user/me")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_signup_validation_and_duplicates() {
    let state = state();
    let app = app!(state);

    let cases = [
        (credentials("not-an-email", "long enough"), "invalid username"),
        (credentials("", "long enough"), "invalid username"),
        (credentials("ada@example.com", "short"), "invalid password"),
    ];
    for (body, message) in cases {
        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "message": message }));
    }

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let req = test::TestRequest::post()
            .uri("/auth/signup")
            .set_json(credentials("ada@example.com", "correct horse"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
        if expected == StatusCode::CONFLICT {
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["message"], "user already exists");
        }
    }
}

#[actix_web::test]
async fn test_login() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(credentials("ada@example.com", "correct horse"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    for body in [
        credentials("ada@example.com", "wrong horse"),
        credentials("nobody@example.com", "correct horse"),
        credentials("garbage", "correct horse"),
    ] {
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(sid(&resp).is_none());
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "invalid username or password");
    }

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(credentials("ADA@example.com", "correct horse"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = sid(&resp).expect("session cookie");

    let req = test::TestRequest::get()
        .uri("/user/me")
        .cookie(cookie)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_versioned_paths_match_bare_paths() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/v1.0/auth/signup")
        .set_json(credentials("ada@example.com", "correct horse"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers().get("api-version").unwrap(), "1.0");
    let cookie = sid(&resp).expect("session cookie");

    for uri in ["/user/me", "/v1.0/user/me", "/v1/user/me"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    }

    let req = test::TestRequest::get()
        .uri("/v2.0/user/me")
        .cookie(cookie)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn test_unknown_routes_are_not_found() {
    let state = state();
    let app = app!(state);

    for (method, uri) in [("GET", "/v1.0/nope"), ("GET", "/nope"), ("DELETE", "/user")] {
        let req = test::TestRequest::default()
            .method(method.parse().unwrap())
            .uri(uri)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "message": "page not found" }));
    }
}

#[actix_web::test]
async fn test_update_profile() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(credentials("ada@example.com", "correct horse"))
        .to_request();
    let cookie = sid(&test::call_service(&app, req).await).expect("session cookie");

    let req = test::TestRequest::patch()
        .uri("/user")
        .set_json(json!({ "full_name": "Ada Lovelace", "telephone": "+44 20 7946 0000" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::patch()
        .uri("/user")
        .cookie(cookie.clone())
        .set_json(json!({ "full_name": "Ada Lovelace", "telephone": "+44 20 7946 0000" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["full_name"], "Ada Lovelace");
    assert_eq!(user["telephone"], "+44 20 7946 0000");

    let invalid = [
        (json!({ "telephone": "call me" }), "invalid telephone format"),
        (json!({ "email": "nope" }), "invalid email"),
        (
            json!({ "full_name": "x".repeat(101) }),
            "full name is too long, maximum length is 100",
        ),
        (
            json!({ "avatar_url": "u".repeat(201) }),
            "avatar is too large, maximum length is 200",
        ),
    ];
    for (body, message) in invalid {
        let req = test::TestRequest::patch()
            .uri("/user")
            .cookie(cookie.clone())
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], message);
    }
}

#[actix_web::test]
async fn test_whoami_with_bearer_token() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(credentials("ada@example.com", "correct horse"))
        .to_request();
    let user: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let user_id = user["id"].as_i64().unwrap();

    let token = state.jwt.issue(user_id, "Ada", Utc::now()).unwrap();
    let req = test::TestRequest::get()
        .uri("/auth/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["email"], "ada@example.com");

    for header in [None, Some("Bearer nope".to_string()), Some(token.clone())] {
        let mut req = test::TestRequest::get().uri("/auth/whoami");
        if let Some(value) = header {
            req = req.insert_header(("Authorization", value));
        }
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

#[actix_web::test]
async fn test_health_is_unversioned() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "memory");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/v1.0/health").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// Session store whose revocations never reach durable storage.
struct RevokeFails(MemoryStore);

#[async_trait]
impl SessionStore for RevokeFails {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        self.0.create_session(new).await
    }

    async fn find_session(
        &self,
        token_hash: &TokenFingerprint,
    ) -> Result<Option<Session>, StoreError> {
        self.0.find_session(token_hash).await
    }

    async fn revoke_session(
        &self,
        _token_hash: &TokenFingerprint,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[actix_web::test]
async fn test_logout_when_revoke_fails_still_logs_out() {
    let users = Arc::new(MemoryStore::new());
    let state = AppState::assemble(
        Config::memory("test-secret"),
        Arc::new(RevokeFails(MemoryStore::new())),
        users,
        None,
        Arc::new(SystemClock),
    )
    .unwrap();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/signup")
        .set_json(credentials("ada@example.com", "correct horse"))
        .to_request();
    let cookie = sid(&test::call_service(&app, req).await).expect("session cookie");

    let req = test::TestRequest::get()
        .uri("/auth/logout")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(sid(&resp).map(|c| c.value().to_string()), Some(String::new()));

    let req = test::TestRequest::get()
        .uri("/user/me")
        .cookie(cookie)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}
