use axum::{extract::State, http::StatusCode, Extension};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    models::{NewUser, PublicUser},
    service::UserService,
    types::{ChangePasswordRequest, UpdateAccountRequest},
};
use crate::session::{cookies, AuthenticatedUser};
use crate::shared::{ApiResponse, AppError, AppJson, AppState};

/// HTTP handler for registering a new user
///
/// POST /users/register
#[instrument(name = "register_user", skip(state, new_user))]
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(new_user): AppJson<NewUser>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let service = UserService::new(Arc::clone(&state.user_repository));
    let user = service.create_user(new_user).await?;

    info!(user_id = %user.id, "User registered via API");

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered Successfully",
    ))
}

/// GET /users/current-user
#[instrument(name = "get_current_user", skip_all)]
pub async fn get_current_user(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user, "User fetched successfully")
}

/// PATCH /users/update-account
#[instrument(name = "update_account_details", skip_all)]
pub async fn update_account_details(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    AppJson(request): AppJson<UpdateAccountRequest>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let update = request.into_update()?;

    let service = UserService::new(Arc::clone(&state.user_repository));
    let updated = service.update_user(&user.id, update).await?;

    Ok(ApiResponse::ok(
        updated,
        "Account details updated successfully",
    ))
}

/// POST /users/change-password
#[instrument(name = "change_current_password", skip_all)]
pub async fn change_current_password(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> Result<ApiResponse<Value>, AppError> {
    let service = UserService::new(Arc::clone(&state.user_repository));
    service
        .change_password(&user.id, &request.old_password, &request.new_password)
        .await?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

/// DELETE /users/delete-account
///
/// Removes the record and clears the auth cookies.
#[instrument(name = "delete_account", skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Value>), AppError> {
    let service = UserService::new(Arc::clone(&state.user_repository));
    service.delete_user(&user.id).await?;

    let jar = jar
        .add(cookies::clear_access_cookie())
        .add(cookies::clear_refresh_cookie());

    Ok((jar, ApiResponse::ok(json!({}), "Account deleted successfully")))
}
