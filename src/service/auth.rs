use crate::config::AuthConfig;
use crate::database::admin_user::{AdminUserRepository, dummy_verify, hash_password, verify_password};
use crate::error::app_error::AppError;
use crate::models::admin_user::AdminUser;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

pub struct AdminAuthService<'a, R> {
    repository: &'a R,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl<'a, R: AdminUserRepository + Sync> AdminAuthService<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        AdminAuthService { repository }
    }

    /// Unknown users, pending users and wrong passwords all fail with
    /// [`AppError::InvalidCredentials`] after one Argon2 verification.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminUser, AppError> {
        let email = normalize_email(email);

        let user = match self.repository.get_admin_user_by_email(&email).await? {
            Some(user) if !user.is_pending() => user,
            _ => {
                dummy_verify(password);
                return Err(AppError::InvalidCredentials);
            }
        };

        verify_password(&user, password)?;

        if let Err(err) = self.repository.record_login(&user.id).await {
            warn!(error = %err, email = %user.email, "failed to record admin login time");
        }
        info!(email = %user.email, "admin logged in");

        Ok(user)
    }

    /// Sets the first password of a pending user.
    pub async fn setup_password(&self, email: &str, password: &str) -> Result<(), AppError> {
        let email = normalize_email(email);

        let user = self
            .repository
            .get_admin_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !user.is_pending() {
            return Err(AppError::BadRequest("Password already set".to_string()));
        }

        let password_hash = hash_password(password)?;
        if !self.repository.set_initial_password(&user.id, &password_hash).await? {
            return Err(AppError::BadRequest("Password already set".to_string()));
        }

        info!(email = %user.email, "admin password set");
        Ok(())
    }
}

/// Constant-time check of the shared site gate password. Always false when
/// no gate password is configured.
pub fn check_gate_password(config: &AuthConfig, candidate: &str) -> bool {
    let Some(expected) = config.gate_password.as_deref().filter(|p| !p.is_empty()) else {
        return false;
    };

    // Compare MACs of both values so the comparison length never depends on input.
    let Ok(mut expected_mac) = Hmac::<Sha256>::new_from_slice(config.session_secret.as_bytes()) else {
        return false;
    };
    expected_mac.update(expected.as_bytes());
    let expected_tag = expected_mac.finalize().into_bytes();

    let Ok(mut candidate_mac) = Hmac::<Sha256>::new_from_slice(config.session_secret.as_bytes()) else {
        return false;
    };
    candidate_mac.update(candidate.as_bytes());
    candidate_mac.verify_slice(&expected_tag).is_ok()
}
