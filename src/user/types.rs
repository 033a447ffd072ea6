use serde::Deserialize;

use super::models::UserUpdate;
use crate::shared::AppError;

/// Body of `PATCH /users/update-account`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

impl UpdateAccountRequest {
    /// Full name and email are both required; asset URLs are optional.
    pub fn into_update(self) -> Result<UserUpdate, AppError> {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
        if !present(&self.full_name) || !present(&self.email) {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        Ok(UserUpdate {
            full_name: self.full_name,
            email: self.email,
            avatar: self.avatar,
            cover_image: self.cover_image,
            password: None,
        })
    }
}

/// Body of `POST /users/change-password`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}
