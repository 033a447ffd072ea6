use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{normalize_identifier, NewUser, PublicUser, UserModel, UserUpdate},
    password::{hash_password_blocking, verify_password_blocking},
    repository::UserRepository,
};
use crate::shared::AppError;

/// Credential store: owns user records and their password hashes
pub struct UserService {
    repository: Arc<dyn UserRepository + Send + Sync>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Registers a user. The password is hashed before anything is persisted.
    #[instrument(skip(self, new_user))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<PublicUser, AppError> {
        let mut fields = new_user.normalized()?;
        info!(username = %fields.username, "Registering user");

        let plaintext = std::mem::take(&mut fields.password);
        let password_hash = hash_password_blocking(plaintext).await?;

        let user = UserModel::new(&fields, password_hash);
        self.repository.create_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user.to_public())
    }

    /// Checks `plaintext` against the stored hash. A mismatch is `Ok(false)`.
    #[instrument(skip(self, user, plaintext), fields(user_id = %user.id))]
    pub async fn verify_password(&self, user: &UserModel, plaintext: &str) -> Result<bool, AppError> {
        verify_password_blocking(plaintext.to_string(), user.password_hash.clone()).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserModel>, AppError> {
        self.repository.find_by_id(id).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserModel>, AppError> {
        let identifier = normalize_identifier(identifier);
        if identifier.is_empty() {
            return Ok(None);
        }
        self.repository.find_by_username_or_email(&identifier).await
    }

    /// Applies `update` to the stored record and persists it.
    #[instrument(skip(self, update))]
    pub async fn update_user(&self, id: &str, update: UserUpdate) -> Result<PublicUser, AppError> {
        let mut user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if update.full_name.as_deref().is_some_and(|n| n.trim().is_empty())
            || update.email.as_deref().is_some_and(|e| e.trim().is_empty())
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        let profile_changed = user.apply_profile(&update);
        let secret_rehashed = self.apply_update(&mut user, update).await?;

        if profile_changed {
            self.repository.update_profile(&user).await?;
        }
        if secret_rehashed
            && !self
                .repository
                .set_password_hash(id, &user.password_hash)
                .await?
        {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if profile_changed || secret_rehashed {
            info!(user_id = %id, secret_rehashed, "User updated");
        }

        // Re-read so timestamps reflect what the store recorded.
        let stored = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(stored.to_public())
    }

    /// Hashes a new plaintext into `user` if the update carries one.
    ///
    /// This is the only place a stored hash is replaced. Updates without a
    /// password leave `password_hash` untouched. Returns whether it rehashed.
    pub(crate) async fn apply_update(
        &self,
        user: &mut UserModel,
        update: UserUpdate,
    ) -> Result<bool, AppError> {
        match update.password {
            Some(plaintext) => {
                if plaintext.trim().is_empty() {
                    return Err(AppError::Validation("Password must not be empty".to_string()));
                }
                user.password_hash = hash_password_blocking(plaintext).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces the password after checking the current one.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !self.verify_password(&user, old_password).await? {
            warn!(user_id = %id, "Password change rejected: old password mismatch");
            return Err(AppError::Validation("Invalid old password".to_string()));
        }

        self.update_user(
            id,
            UserUpdate {
                password: Some(new_password.to_string()),
                ..Default::default()
            },
        )
        .await?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Deletes the account; its refresh token reference goes with it.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        if !self.repository.delete_user(id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }
}
