use crate::database::admin_user::AdminUserRepository;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::admin_user::{AdminUser, AdminUserResponse};
use crate::session::{SESSION_COOKIE, SessionAuthenticator};
use rocket::http::{Cookie, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket::time::Duration as CookieDuration;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;

/// The signed-in admin, resolved from the session cookie and the user table.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&AdminUser> for AdminSession {
    fn from(user: &AdminUser) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

impl From<&AdminSession> for AdminUserResponse {
    fn from(session: &AdminSession) -> Self {
        Self {
            email: session.email.clone(),
            name: session.name.clone(),
            role: session.role.clone(),
        }
    }
}

/// Email carried by a valid session cookie, without touching the database.
pub(crate) fn session_subject(req: &Request<'_>) -> Option<String> {
    let authenticator = req.rocket().state::<SessionAuthenticator>()?;
    let cookie = req.cookies().get(SESSION_COOKIE)?;
    authenticator.verify(cookie.value())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(email) = session_subject(req) else {
            return Outcome::Error((Status::Unauthorized, AppError::Unauthorized));
        };

        let pool = match req.rocket().state::<PgPool>() {
            Some(pool) => pool,
            None => return Outcome::Error((Status::InternalServerError, AppError::Unauthorized)),
        };

        let repo = PostgresRepository { pool: pool.clone() };

        match repo.get_admin_user_by_email(&email).await {
            Ok(Some(user)) => {
                let session = AdminSession::from(&user);
                req.local_cache(|| Some(session.clone()));
                Outcome::Success(session)
            }
            Ok(None) => {
                debug!(%email, "session cookie names an unknown admin");
                Outcome::Error((Status::Unauthorized, AppError::Unauthorized))
            }
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminSession {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Signed session cookie. Log in via POST /api/admin/login to obtain it.".to_string()),
            data: SecuritySchemeData::ApiKey {
                name: SESSION_COOKIE.to_string(),
                location: "cookie".to_string(),
            },
            extensions: Object::default(),
        };

        let mut security_req = SecurityRequirement::new();
        security_req.insert("cookieAuth".to_string(), Vec::new());

        Ok(RequestHeaderInput::Security("cookieAuth".to_string(), security_scheme, security_req))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - admin session required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(ttl.as_secs() as i64))
        .build()
}

/// Cookie that, once removed through the jar, clears the session on the client.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
