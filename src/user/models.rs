use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::password::check_password_length;
use crate::shared::AppError;

/// Database model for the users table.
///
/// Deliberately not `Serialize`: responses go through [`PublicUser`], which
/// has no secret-bearing fields.
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password_hash: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserModel {
    /// Builds a record from already-normalised registration fields and a
    /// precomputed password hash.
    pub fn new(fields: &NewUser, password_hash: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            username: fields.username.clone(),
            email: fields.email.clone(),
            full_name: fields.full_name.clone(),
            avatar: fields.avatar.clone(),
            cover_image: fields.cover_image.clone(),
            password_hash,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Copies profile fields from `update`. Returns whether anything changed.
    /// The password is not handled here; see `UserService::apply_update`.
    pub fn apply_profile(&mut self, update: &UserUpdate) -> bool {
        let mut changed = false;

        if let Some(full_name) = &update.full_name {
            changed |= replace_if_different(&mut self.full_name, full_name.trim().to_string());
        }
        if let Some(email) = &update.email {
            changed |= replace_if_different(&mut self.email, normalize_identifier(email));
        }
        if let Some(avatar) = &update.avatar {
            let avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
            if self.avatar != avatar {
                self.avatar = avatar;
                changed = true;
            }
        }
        if let Some(cover_image) = &update.cover_image {
            let cover_image = Some(cover_image.trim().to_string()).filter(|c| !c.is_empty());
            if self.cover_image != cover_image {
                self.cover_image = cover_image;
                changed = true;
            }
        }

        changed
    }
}

fn replace_if_different(field: &mut String, value: String) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

/// Usernames and emails are stored trimmed and lower-cased.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// External representation of a user, safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input, including the plaintext password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

impl NewUser {
    /// Trims every field, lower-cases the identifiers and rejects blanks.
    pub fn normalized(self) -> Result<Self, AppError> {
        let normalized = Self {
            username: normalize_identifier(&self.username),
            email: normalize_identifier(&self.email),
            full_name: self.full_name.trim().to_string(),
            password: self.password,
            avatar: self
                .avatar
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            cover_image: self
                .cover_image
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        };

        let required = [
            &normalized.username,
            &normalized.email,
            &normalized.full_name,
        ];
        if required.iter().any(|field| field.is_empty()) || normalized.password.trim().is_empty()
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }
        check_password_length(&normalized.password)?;

        Ok(normalized)
    }
}

/// Partial update of a user record. `password` carries a new plaintext.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> NewUser {
        NewUser {
            username: "  Alice ".to_string(),
            email: " A@X.com".to_string(),
            full_name: " Alice Liddell ".to_string(),
            password: "p@ss1234".to_string(),
            avatar: Some("https://cdn.example/a.png".to_string()),
            cover_image: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_normalized_trims_and_lowercases() {
        let user = alice().normalized().unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.full_name, "Alice Liddell");
        assert_eq!(user.password, "p@ss1234");
        assert_eq!(user.cover_image, None);
    }

    #[test]
    fn test_normalized_rejects_blank_fields() {
        let mut user = alice();
        user.full_name = "   ".to_string();

        let result = user.normalized();
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "All fields are required"));
    }

    #[test]
    fn test_normalized_rejects_overlong_password() {
        let mut user = alice();
        user.password = format!("{}X", "A".repeat(72));

        assert!(matches!(user.normalized(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_public_user_has_no_secrets() {
        let fields = alice().normalized().unwrap();
        let mut model = UserModel::new(&fields, "$2b$10$hash".to_string());
        model.refresh_token_hash = Some("digest".to_string());

        let json = serde_json::to_value(model.to_public()).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("passwordHash"));
        assert!(!object.contains_key("refreshTokenHash"));
        assert!(!json.to_string().contains("$2b$10$hash"));
        assert_eq!(json["fullName"], "Alice Liddell");
    }

    #[test]
    fn test_apply_profile_reports_changes() {
        let fields = alice().normalized().unwrap();
        let mut model = UserModel::new(&fields, "hash".to_string());

        let unchanged = UserUpdate {
            full_name: Some("Alice Liddell".to_string()),
            ..Default::default()
        };
        assert!(!model.apply_profile(&unchanged));

        let changed = UserUpdate {
            email: Some(" NEW@x.com ".to_string()),
            ..Default::default()
        };
        assert!(model.apply_profile(&changed));
        assert_eq!(model.email, "new@x.com");
        assert_eq!(model.password_hash, "hash");
    }
}
