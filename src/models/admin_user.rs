use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Stored in place of a hash until the user has chosen a password.
pub const PENDING_PASSWORD_HASH: &str = "PENDING";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn is_pending(&self) -> bool {
        self.password_hash == PENDING_PASSWORD_HASH
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct AdminUserResponse {
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&AdminUser> for AdminUserResponse {
    fn from(user: &AdminUser) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

// Missing fields deserialize to empty strings so the caller gets a
// field-specific 400 from validation rather than a parse error.

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    pub password: String,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct SetupPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct GateCheckRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LoginResponse {
    pub ok: bool,
    pub user: AdminUserResponse,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_missing_fields_fails_validation() {
        let request: LoginRequest = serde_json::from_str(r#"{"email":"desk@fairway.test"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
        assert!(!errors.field_errors().contains_key("email"));
    }

    #[test]
    fn setup_password_requires_eight_characters() {
        let short = SetupPasswordRequest {
            email: "desk@fairway.test".to_string(),
            password: "short".to_string(),
        };
        assert!(short.validate().is_err());

        let long_enough = SetupPasswordRequest {
            email: "desk@fairway.test".to_string(),
            password: "eightchr".to_string(),
        };
        assert!(long_enough.validate().is_ok());
    }

    #[test]
    fn response_exposes_only_public_fields() {
        let user = AdminUser {
            id: Uuid::new_v4(),
            email: "desk@fairway.test".to_string(),
            name: "Desk".to_string(),
            password_hash: PENDING_PASSWORD_HASH.to_string(),
            role: "editor".to_string(),
            last_login_at: None,
            created_at: Utc::now(),
        };
        assert!(user.is_pending());
        assert_eq!(
            serde_json::to_value(AdminUserResponse::from(&user)).unwrap(),
            serde_json::json!({"email": "desk@fairway.test", "name": "Desk", "role": "editor"})
        );
    }
}
