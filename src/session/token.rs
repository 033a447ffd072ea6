use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::types::{AccessClaims, RefreshClaims};
use crate::config::AuthConfig;
use crate::shared::AppError;
use crate::user::UserModel;

/// Mints access and refresh tokens. Pure apart from reading the clock.
#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<AuthConfig>,
}

impl TokenIssuer {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }

    pub fn issue_access_token(&self, user: &UserModel) -> Result<String, AppError> {
        self.issue_access_token_at(user, Utc::now())
    }

    /// Signs `{sub, email, username, fullName}` with the access secret
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn issue_access_token_at(
        &self,
        user: &UserModel,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let exp = expires_at(issued_at, self.config.access_token_expiry())?;
        debug!(exp_timestamp = exp, "Creating access token");

        let claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            iat: issued_at.timestamp(),
            exp,
        };

        sign(&claims, self.config.access_token_secret())
    }

    pub fn issue_refresh_token(&self, user: &UserModel) -> Result<String, AppError> {
        self.issue_refresh_token_at(user, Utc::now())
    }

    /// Signs `{sub, jti}` with the refresh secret. Persisting the reference
    /// is the caller's job.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn issue_refresh_token_at(
        &self,
        user: &UserModel,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let exp = expires_at(issued_at, self.config.refresh_token_expiry())?;
        debug!(exp_timestamp = exp, "Creating refresh token");

        let claims = RefreshClaims {
            sub: user.id.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp,
        };

        sign(&claims, self.config.refresh_token_secret())
    }
}

fn expires_at(issued_at: DateTime<Utc>, lifetime: std::time::Duration) -> Result<i64, AppError> {
    let lifetime = Duration::from_std(lifetime)
        .map_err(|e| AppError::Internal(format!("token lifetime out of range: {e}")))?;
    issued_at
        .checked_add_signed(lifetime)
        .map(|exp| exp.timestamp())
        .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))
}

fn sign<C: Serialize>(claims: &C, secret: &[u8]) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| {
        debug!(error = %e, "Failed to encode JWT token");
        AppError::Internal(format!("jwt encode: {e}"))
    })
}

/// Checks signature and expiry of presented tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    config: Arc<AuthConfig>,
}

impl TokenVerifier {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }

    /// Decodes `token` with `secret`. The signature is checked before any
    /// claim is looked at; malformed, forged and expired tokens are all
    /// `Unauthorized`.
    #[instrument(skip(self, token, secret))]
    pub fn verify<C: DeserializeOwned>(&self, token: &str, secret: &[u8]) -> Result<C, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.clock_skew_secs();
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<C>(token, &DecodingKey::from_secret(secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Failed to decode JWT token");
                AppError::Unauthorized("Invalid token".to_string())
            })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        self.verify(token, self.config.access_token_secret())
            .map_err(|_| AppError::Unauthorized("Invalid access token".to_string()))
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, AppError> {
        self.verify(token, self.config.refresh_token_secret())
            .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))
    }
}

/// SHA-256 hex digest under which a refresh token is referenced at rest.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
