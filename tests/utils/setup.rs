use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use mediashare::{
    config::ServerConfig, router, AppState, AuthConfig, InMemoryUserRepository,
};

pub const ACCESS_SECRET: &str = "integration-access-secret";
pub const REFRESH_SECRET: &str = "integration-refresh-secret";
pub const PASSWORD: &str = "p@ss1234";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub fn auth_config() -> AuthConfig {
    AuthConfig::new(
        ACCESS_SECRET,
        Duration::from_secs(15 * 60),
        REFRESH_SECRET,
        Duration::from_secs(10 * 24 * 60 * 60),
    )
    .unwrap()
}

/// Response pieces the assertions care about
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// All `Set-Cookie` values, for cookie assertions
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn cookie_value(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        })
    }
}

pub struct TestApp {
    pub app: Router,
    pub repo: Arc<InMemoryUserRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryUserRepository::new());
        let state = AppState::new(repo.clone(), Arc::new(auth_config()));
        let app = router(state, &ServerConfig::default());

        Self { app, repo }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get_with_bearer(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn register(&self, username: &str, email: &str) -> TestResponse {
        self.post_json(
            "/api/v1/users/register",
            json!({
                "username": username,
                "email": email,
                "fullName": "Test User",
                "password": PASSWORD,
            }),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/v1/users/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Registers `username` and logs in, returning the login response
    pub async fn registered_and_logged_in(&self, username: &str) -> TestResponse {
        let registered = self
            .register(username, &format!("{username}@example.com"))
            .await;
        assert_eq!(registered.status, StatusCode::CREATED);

        let login = self.login(username, PASSWORD).await;
        assert_eq!(login.status, StatusCode::OK);
        login
    }
}
