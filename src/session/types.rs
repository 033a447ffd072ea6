use serde::{Deserialize, Serialize};

use crate::user::PublicUser;

/// JWT claims of an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: String, // User id
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT claims of a refresh token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String, // Makes every issued token distinct
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of `POST /users/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Email takes precedence over username; blank values count as absent.
    pub fn identifier(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.username.as_deref().filter(|u| !u.trim().is_empty()))
    }
}

/// Response data for a successful login
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Optional body of `POST /users/refresh-token`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}
