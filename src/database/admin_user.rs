use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::admin_user::{AdminUser, PENDING_PASSWORD_HASH};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::LazyLock;
use uuid::Uuid;

/// A real Argon2 hash generated once, used as a timing decoy so that logins
/// for unknown or pending users cost the same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", &salt)
        .ok()
        .map(|hash| hash.to_string())
});

#[async_trait::async_trait]
pub trait AdminUserRepository {
    async fn get_admin_user_by_email(&self, email: &str) -> Result<Option<AdminUser>, AppError>;
    async fn record_login(&self, id: &Uuid) -> Result<(), AppError>;
    /// Stores the first password. Returns false when the user already has one.
    async fn set_initial_password(&self, id: &Uuid, password_hash: &str) -> Result<bool, AppError>;
}

#[async_trait::async_trait]
impl AdminUserRepository for PostgresRepository {
    async fn get_admin_user_by_email(&self, email: &str) -> Result<Option<AdminUser>, AppError> {
        let user = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, email, name, password_hash, role, last_login_at, created_at
            FROM admin_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn record_login(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE admin_users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_initial_password(&self, id: &Uuid, password_hash: &str) -> Result<bool, AppError> {
        // The PENDING guard in the WHERE clause makes concurrent setups race safely.
        let result = sqlx::query("UPDATE admin_users SET password_hash = $1 WHERE id = $2 AND password_hash = $3")
            .bind(password_hash)
            .bind(id)
            .bind(PENDING_PASSWORD_HASH)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(user: &AdminUser, password: &str) -> Result<(), AppError> {
    let password_hash = PasswordHash::new(&user.password_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &password_hash)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Perform a throwaway Argon2 verification so that a missing account takes
/// as long to reject as a wrong password.
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref().and_then(|hash| PasswordHash::new(hash).ok()) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}
