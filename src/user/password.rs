//! Password hashing via bcrypt.
//!
//! `bcrypt::verify` recomputes the hash with the stored salt and compares the
//! digests in constant time. bcrypt only reads the first 72 bytes of its
//! input, so longer passwords are refused instead of silently truncated.

use tracing::warn;

use crate::shared::AppError;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Longest password bcrypt hashes without truncation.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Rejects passwords bcrypt would truncate.
pub fn check_password_length(password: &str) -> Result<(), AppError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Hash a password with bcrypt (cost 10, random salt).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    check_password_length(password)?;
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    // Nothing longer was ever hashed, and bcrypt would compare only its prefix.
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    bcrypt::verify(password, hash).map_err(|e| {
        warn!(error = %e, "Stored password hash could not be verified");
        AppError::Internal(format!("bcrypt verify: {e}"))
    })
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_differs_from_plaintext() {
        let hash = hash_password("p@ss1234").unwrap();
        assert_ne!(hash, "p@ss1234");
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("p@ss1234").unwrap();
        let second = hash_password("p@ss1234").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("p@ss1234").unwrap();
        assert!(verify_password("p@ss1234", &hash).unwrap());
        assert!(!verify_password("p@ss12345", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_long_passwords_are_not_truncated() {
        let at_limit = "A".repeat(MAX_PASSWORD_BYTES);
        let hash = hash_password(&at_limit).unwrap();

        assert!(verify_password(&at_limit, &hash).unwrap());
        assert!(!verify_password(&format!("{at_limit}Y"), &hash).unwrap());

        let too_long = hash_password(&format!("{at_limit}X"));
        assert!(matches!(too_long, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_corrupt_hash_is_internal_error() {
        let result = verify_password("p@ss1234", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("secret".to_string()).await.unwrap();
        assert!(verify_password_blocking("secret".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("other".to_string(), hash)
            .await
            .unwrap());
    }
}
