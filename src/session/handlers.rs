use axum::{extract::State, Extension};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    cookies,
    middleware::AuthenticatedUser,
    service::SessionService,
    types::{LoginRequest, LoginResponse, RefreshTokenRequest, TokenPair},
};
use crate::shared::{ApiResponse, AppError, AppJson, AppState};

fn session_service(state: &AppState) -> SessionService {
    SessionService::new(
        Arc::clone(&state.user_repository),
        Arc::clone(&state.auth_config),
    )
}

fn with_session_cookies(jar: CookieJar, state: &AppState, tokens: &TokenPair) -> CookieJar {
    jar.add(cookies::access_cookie(
        &tokens.access_token,
        state.auth_config.access_token_expiry(),
    ))
    .add(cookies::refresh_cookie(
        &tokens.refresh_token,
        state.auth_config.refresh_token_expiry(),
    ))
}

/// HTTP handler for logging in
///
/// POST /users/login
/// Returns both tokens in the body and as HttpOnly cookies
#[instrument(name = "login_user", skip_all)]
pub async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), AppError> {
    let response = session_service(&state).login(request).await?;

    let tokens = TokenPair {
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone(),
    };
    let jar = with_session_cookies(jar, &state, &tokens);

    info!(user_id = %response.user.id, "Login succeeded");
    Ok((jar, ApiResponse::ok(response, "User logged In Successfully")))
}

/// POST /users/logout
///
/// Clears the stored refresh reference and both cookies
#[instrument(name = "logout_user", skip_all)]
pub async fn logout_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Value>), AppError> {
    session_service(&state).logout(&user.id).await?;

    let jar = jar
        .add(cookies::clear_access_cookie())
        .add(cookies::clear_refresh_cookie());

    Ok((jar, ApiResponse::ok(json!({}), "User logged Out")))
}

/// POST /users/refresh-token
///
/// Reads the refresh token from its cookie, falling back to the JSON body
#[instrument(name = "refresh_access_token", skip_all)]
pub async fn refresh_access_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<AppJson<RefreshTokenRequest>>,
) -> Result<(CookieJar, ApiResponse<TokenPair>), AppError> {
    let from_cookie = jar
        .get(cookies::REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let from_body = body
        .and_then(|AppJson(request)| request.refresh_token)
        .filter(|v| !v.is_empty());

    let Some(incoming) = from_cookie.or(from_body) else {
        warn!("Refresh requested without a refresh token");
        return Err(AppError::Unauthorized("Unauthorized request".to_string()));
    };

    let tokens = session_service(&state).refresh(&incoming).await?;
    let jar = with_session_cookies(jar, &state, &tokens);

    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}
