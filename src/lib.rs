// Library crate for the media-sharing auth backend
// This file exposes the public API and router for integration tests

pub mod config;
pub mod session;
pub mod shared;
pub mod user;

use std::any::Any;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use config::ServerConfig;

// Re-export commonly used types for easier access in tests
pub use config::{AppConfig, AuthConfig};
pub use shared::{ApiError, ApiResponse, AppError, AppState};
pub use user::repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository};

const MAX_BODY_BYTES: usize = 16 * 1024;

async fn healthcheck() -> ApiResponse<&'static str> {
    ApiResponse::success("OK")
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");
    AppError::Internal(detail.to_string()).into_response()
}

/// Builds the full HTTP surface under `/api/v1`.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/logout", post(session::logout_user))
        .route("/current-user", get(user::get_current_user))
        .route("/change-password", post(user::change_current_password))
        .route("/update-account", patch(user::update_account_details))
        .route("/delete-account", delete(user::delete_account))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::verify_jwt,
        ));

    let users = Router::new()
        .route("/register", post(user::register_user))
        .route("/login", post(session::login_user))
        .route("/refresh-token", post(session::refresh_access_token))
        .merge(protected);

    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/users", users);

    let mut app = Router::new()
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = server.cors_origin.clone() {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        );
    }

    app.with_state(state)
}
