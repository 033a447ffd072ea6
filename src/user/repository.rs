use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use super::models::UserModel;
use crate::shared::AppError;

const DUPLICATE_USER_MESSAGE: &str = "User with email or username already exists";

/// Trait for user record storage.
///
/// Lookups return `Ok(None)` for absent records. Every write touches a single
/// record and is applied atomically.
#[async_trait]
pub trait UserRepository {
    /// Inserts a new record. Fails with `Conflict` if the username or email is taken.
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserModel>, AppError>;

    /// Matches `identifier` against both username and email.
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserModel>, AppError>;

    /// Persists the profile fields of `user`. Never writes the password hash
    /// or the refresh token reference.
    async fn update_profile(&self, user: &UserModel) -> Result<(), AppError>;

    /// Replaces the password hash. Returns `false` if the user no longer exists.
    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError>;

    /// Overwrites (or clears) the refresh token reference. Returns `false` if
    /// the user no longer exists.
    async fn set_refresh_token(
        &self,
        user_id: &str,
        token_hash: Option<&str>,
    ) -> Result<bool, AppError>;

    /// Replaces the refresh token reference only if it still equals
    /// `expected_hash`. Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        expected_hash: &str,
        replacement_hash: &str,
    ) -> Result<bool, AppError>;

    /// Removes the record. Returns `false` if it did not exist.
    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError>;
}

/// In-memory implementation of UserRepository for development and testing
///
/// Data is stored in memory and will be lost when the application restarts.
/// Uniqueness of username and email is checked under the same lock as the write.
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, UserModel>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of users in the repository
    pub fn user_count(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<String, UserModel>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("user store lock poisoned".to_string()))
    }
}

fn identity_taken(users: &HashMap<String, UserModel>, candidate: &UserModel) -> bool {
    users.values().any(|existing| {
        existing.id != candidate.id
            && (existing.username == candidate.username || existing.email == candidate.email)
    })
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, username = %user.username, "Creating user in memory");

        let mut users = self.users()?;
        if users.contains_key(&user.id) || identity_taken(&users, user) {
            warn!(username = %user.username, "User already exists in memory");
            return Err(AppError::Conflict(DUPLICATE_USER_MESSAGE.to_string()));
        }
        users.insert(user.id.clone(), user.clone());

        debug!(user_id = %user.id, "User created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<UserModel>, AppError> {
        debug!(user_id = %id, "Fetching user from memory");

        let users = self.users()?;
        let user = users.get(id).cloned();

        match &user {
            Some(u) => debug!(user_id = %id, username = %u.username, "User found in memory"),
            None => debug!(user_id = %id, "User not found in memory"),
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserModel>, AppError> {
        debug!(identifier = %identifier, "Looking up user by username or email in memory");

        let users = self.users()?;
        let user = users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned();

        Ok(user)
    }

    #[instrument(skip(self, user))]
    async fn update_profile(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, "Updating user profile in memory");

        let mut users = self.users()?;
        if identity_taken(&users, user) {
            warn!(user_id = %user.id, "Update would duplicate username or email");
            return Err(AppError::Conflict(DUPLICATE_USER_MESSAGE.to_string()));
        }

        let existing = match users.get_mut(&user.id) {
            Some(existing) => existing,
            None => {
                warn!(user_id = %user.id, "User not found for update in memory");
                return Err(AppError::NotFound("User not found".to_string()));
            }
        };

        existing.username = user.username.clone();
        existing.email = user.email.clone();
        existing.full_name = user.full_name.clone();
        existing.avatar = user.avatar.clone();
        existing.cover_image = user.cover_image.clone();
        existing.updated_at = Utc::now();

        debug!(user_id = %user.id, "User profile updated in memory");
        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(user_id) else {
            debug!(user_id = %user_id, "User not found while storing password hash");
            return Ok(false);
        };

        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    #[instrument(skip(self, token_hash))]
    async fn set_refresh_token(
        &self,
        user_id: &str,
        token_hash: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(user_id) else {
            debug!(user_id = %user_id, "User not found while storing refresh token");
            return Ok(false);
        };

        user.refresh_token_hash = token_hash.map(str::to_string);
        user.updated_at = Utc::now();

        debug!(user_id = %user_id, cleared = token_hash.is_none(), "Refresh token reference stored");
        Ok(true)
    }

    #[instrument(skip(self, expected_hash, replacement_hash))]
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        expected_hash: &str,
        replacement_hash: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };

        if user.refresh_token_hash.as_deref() != Some(expected_hash) {
            debug!(user_id = %user_id, "Refresh token reference changed, rotation refused");
            return Ok(false);
        }

        user.refresh_token_hash = Some(replacement_hash.to_string());
        user.updated_at = Utc::now();

        debug!(user_id = %user_id, "Refresh token rotated (atomic)");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        debug!(user_id = %user_id, "Deleting user from memory");

        let removed = self.users()?.remove(user_id).is_some();
        if !removed {
            warn!(user_id = %user_id, "User not found for deletion in memory");
        }
        Ok(removed)
    }
}

/// PostgreSQL implementation of user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            warn!(error = %e, "Failed to connect to database");
            AppError::DatabaseError(e.to_string())
        })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("migration failed: {e}")))?;

        info!("Database connected and migrations applied");
        Ok(Self::new(pool))
    }
}

fn map_write_error(e: sqlx::Error) -> AppError {
    let unique_violation = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505");

    if unique_violation {
        AppError::Conflict(DUPLICATE_USER_MESSAGE.to_string())
    } else {
        warn!(error = %e, "User write failed");
        AppError::DatabaseError(e.to_string())
    }
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
    password_hash, refresh_token_hash, created_at, updated_at";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, username = %user.username, "Creating user in database");

        sqlx::query(
            "INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        debug!(user_id = %user.id, "User created successfully in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<UserModel>, AppError> {
        debug!(user_id = %id, "Fetching user from database");

        sqlx::query_as::<_, UserModel>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = %id, "Failed to fetch user from database");
                AppError::DatabaseError(e.to_string())
            })
    }

    #[instrument(skip(self))]
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<UserModel>, AppError> {
        sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to look up user by username or email");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, user))]
    async fn update_profile(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, "Updating user profile in database");

        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, full_name = $4, avatar = $5, \
             cover_image = $6, updated_at = now() WHERE id = $1",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            warn!(user_id = %user.id, "User not found for update");
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
                .bind(user_id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, user_id = %user_id, "Failed to store password hash");
                    AppError::DatabaseError(e.to_string())
                })?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, token_hash))]
    async fn set_refresh_token(
        &self,
        user_id: &str,
        token_hash: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %user_id, "Failed to store refresh token reference");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, expected_hash, replacement_hash))]
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        expected_hash: &str,
        replacement_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_at = now() \
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(expected_hash)
        .bind(replacement_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %user_id, "Failed to rotate refresh token");
            AppError::DatabaseError(e.to_string())
        })?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        debug!(user_id = %user_id, "Deleting user from database");

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = %user_id, "Failed to delete user from database");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::user::models::NewUser;

    /// Creates a user record with a placeholder hash
    pub fn create_test_user(username: &str) -> UserModel {
        let fields = NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: format!("{username} tester"),
            password: "unused".to_string(),
            avatar: None,
            cover_image: None,
        };
        UserModel::new(&fields, "$2b$10$placeholder".to_string())
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");

        repo.create_user(&user).await.unwrap();

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        let by_name = repo.find_by_username_or_email("alice").await.unwrap();
        assert_eq!(by_name.unwrap().id, user.id);

        let by_email = repo
            .find_by_username_or_email("alice@example.com")
            .await
            .unwrap();
        assert_eq!(by_email.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_missing_user_is_none() {
        let repo = InMemoryUserRepository::new();

        assert!(repo.find_by_id("nonexistent").await.unwrap().is_none());
        assert!(repo
            .find_by_username_or_email("nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create_user(&create_test_user("alice")).await.unwrap();

        let same_username = create_test_user("alice");
        let result = repo.create_user(&same_username).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let mut same_email = create_test_user("alicia");
        same_email.email = "alice@example.com".to_string();
        let result = repo.create_user(&same_email).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        assert_eq!(repo.user_count(), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_refresh_reference() {
        let repo = InMemoryUserRepository::new();
        let mut user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();
        repo.set_refresh_token(&user.id, Some("digest-1"))
            .await
            .unwrap();

        user.full_name = "Alice L.".to_string();
        repo.update_profile(&user).await.unwrap();

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Alice L.");
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("digest-1"));
    }

    #[tokio::test]
    async fn test_profile_write_from_stale_snapshot_keeps_new_hash() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();

        let mut snapshot = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(repo.set_password_hash(&user.id, "$2b$10$rotated").await.unwrap());

        snapshot.full_name = "Alice L.".to_string();
        repo.update_profile(&snapshot).await.unwrap();

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Alice L.");
        assert_eq!(stored.password_hash, "$2b$10$rotated");
    }

    #[tokio::test]
    async fn test_set_password_hash_missing_user() {
        let repo = InMemoryUserRepository::new();
        assert!(!repo.set_password_hash("missing", "$2b$10$x").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_nonexistent_user() {
        let repo = InMemoryUserRepository::new();
        let result = repo.update_profile(&create_test_user("ghost")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_and_clear_refresh_token() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();

        assert!(repo.set_refresh_token(&user.id, Some("digest")).await.unwrap());
        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("digest"));

        assert!(repo.set_refresh_token(&user.id, None).await.unwrap());
        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());

        assert!(!repo.set_refresh_token("missing", Some("x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_rotate_is_conditional() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();
        repo.set_refresh_token(&user.id, Some("old")).await.unwrap();

        assert!(!repo.rotate_refresh_token(&user.id, "stale", "new").await.unwrap());
        assert!(repo.rotate_refresh_token(&user.id, "old", "new").await.unwrap());
        assert!(!repo.rotate_refresh_token(&user.id, "old", "newer").await.unwrap());

        let stored = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_rotate_without_reference_fails() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();

        assert!(!repo.rotate_refresh_token(&user.id, "any", "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = InMemoryUserRepository::new();
        let user = create_test_user("alice");
        repo.create_user(&user).await.unwrap();

        assert!(repo.delete_user(&user.id).await.unwrap());
        assert!(repo.find_by_id(&user.id).await.unwrap().is_none());
        assert!(!repo.delete_user(&user.id).await.unwrap());
    }
}
