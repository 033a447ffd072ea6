use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    token::{hash_refresh_token, TokenIssuer, TokenVerifier},
    types::{LoginRequest, LoginResponse, TokenPair},
};
use crate::config::AuthConfig;
use crate::shared::AppError;
use crate::user::{repository::UserRepository, PublicUser, UserModel, UserService};

const INVALID_CREDENTIALS: &str = "Invalid user credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
const REFRESH_TOKEN_REUSED: &str = "Refresh token is expired or used";

/// Service for handling login, token rotation and request authentication
pub struct SessionService {
    users: UserService,
    repository: Arc<dyn UserRepository + Send + Sync>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn UserRepository + Send + Sync>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            users: UserService::new(repository.clone()),
            repository,
            issuer: TokenIssuer::new(config.clone()),
            verifier: TokenVerifier::new(config),
        }
    }

    /// Checks credentials and starts a new session, replacing any previous one.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let identifier = request
            .identifier()
            .ok_or_else(|| AppError::Validation("username or email is required".to_string()))?;

        let Some(user) = self.users.find_by_username_or_email(identifier).await? else {
            warn!("Login failed: no such user");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !self.users.verify_password(&user, &request.password).await? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let tokens = self.generate_access_and_refresh_tokens(&user).await?;
        info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            user: user.to_public(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Mints a token pair and stores the refresh reference. Nothing is
    /// returned unless the store accepted the write.
    async fn generate_access_and_refresh_tokens(
        &self,
        user: &UserModel,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.issuer.issue_access_token(user)?;
        let refresh_token = self.issuer.issue_refresh_token(user)?;

        let stored = self
            .repository
            .set_refresh_token(&user.id, Some(&hash_refresh_token(&refresh_token)))
            .await?;
        if !stored {
            warn!(user_id = %user.id, "User vanished before refresh token could be stored");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchanges a refresh token for a new pair, rotating the stored reference.
    #[instrument(skip(self, incoming_refresh_token))]
    pub async fn refresh(&self, incoming_refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.verifier.verify_refresh_token(incoming_refresh_token)?;

        let Some(user) = self.users.find_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "Refresh token subject no longer exists");
            return Err(AppError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()));
        };

        let presented_hash = hash_refresh_token(incoming_refresh_token);
        if user.refresh_token_hash.as_deref() != Some(presented_hash.as_str()) {
            warn!(user_id = %user.id, "Refresh token does not match the active session");
            return Err(AppError::Unauthorized(REFRESH_TOKEN_REUSED.to_string()));
        }

        let access_token = self.issuer.issue_access_token(&user)?;
        let refresh_token = self.issuer.issue_refresh_token(&user)?;

        let rotated = self
            .repository
            .rotate_refresh_token(&user.id, &presented_hash, &hash_refresh_token(&refresh_token))
            .await?;
        if !rotated {
            warn!(user_id = %user.id, "Lost refresh rotation race");
            return Err(AppError::Unauthorized(REFRESH_TOKEN_REUSED.to_string()));
        }

        info!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Ends the user's session by clearing the stored refresh reference.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        if !self.repository.set_refresh_token(user_id, None).await? {
            warn!(user_id = %user_id, "Logout for a user that no longer exists");
        }
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Resolves an access token to the live user it was issued for.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &str) -> Result<PublicUser, AppError> {
        let claims = self.verifier.verify_access_token(token)?;

        match self.users.find_by_id(&claims.sub).await? {
            Some(user) => Ok(user.to_public()),
            None => {
                warn!(user_id = %claims.sub, "Access token subject no longer exists");
                Err(AppError::Unauthorized("Invalid Access Token".to_string()))
            }
        }
    }
}
