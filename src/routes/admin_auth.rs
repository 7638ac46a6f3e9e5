use crate::Config;
use crate::auth::{AdminSession, removal_cookie, session_cookie};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::AuthRateLimit;
use crate::models::admin_user::{AdminUserResponse, GateCheckRequest, LoginRequest, LoginResponse, MessageResponse, OkResponse, SetupPasswordRequest};
use crate::service::auth::{AdminAuthService, check_gate_password};
use crate::session::SessionAuthenticator;
use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::{info, warn};
use validator::Validate;

/// Log in with email and password
///
/// Sets the signed `admin_session` cookie on success. Unknown users, pending
/// users and wrong passwords all receive the same 401. Attempts are also
/// limited per email, whichever address they come from.
#[openapi(tag = "Admin Auth")]
#[post("/login", data = "<payload>")]
pub async fn post_login(
    pool: &State<PgPool>,
    authenticator: &State<SessionAuthenticator>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    rate_limit: AuthRateLimit<'_>,
    payload: JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;
    rate_limit.check_account(&payload.email).await?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = AdminAuthService::new(&repo).login(&payload.email, &payload.password).await?;

    let token = authenticator.issue(&user.email);
    cookies.add(session_cookie(token, authenticator.ttl(), config.auth.secure_cookies));

    Ok(Json(LoginResponse {
        ok: true,
        user: AdminUserResponse::from(&user),
    }))
}

/// Log out
///
/// Clears the session cookie. Tokens are stateless, so there is nothing to revoke.
#[openapi(tag = "Admin Auth")]
#[post("/logout")]
pub fn post_logout(cookies: &CookieJar<'_>) -> Json<OkResponse> {
    cookies.remove(removal_cookie());
    Json(OkResponse::ok())
}

/// Set the first password of an invited admin
#[openapi(tag = "Admin Auth")]
#[post("/setup-password", data = "<payload>")]
pub async fn post_setup_password(
    pool: &State<PgPool>,
    rate_limit: AuthRateLimit<'_>,
    payload: JsonBody<SetupPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    rate_limit.check_account(&payload.email).await?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    AdminAuthService::new(&repo).setup_password(&payload.email, &payload.password).await?;

    Ok(Json(MessageResponse {
        ok: true,
        message: "Password set. You can now log in.".to_string(),
    }))
}

/// Check the shared site gate password
#[openapi(tag = "Admin Auth")]
#[post("/auth", data = "<payload>")]
pub fn post_gate_check(config: &State<Config>, _rate_limit: AuthRateLimit<'_>, payload: JsonBody<GateCheckRequest>) -> Result<Json<OkResponse>, AppError> {
    if config.auth.gate_password.is_none() {
        warn!("gate check attempted but no gate password is configured");
    }

    if check_gate_password(&config.auth, &payload.password) {
        info!("gate password accepted");
        Ok(Json(OkResponse::ok()))
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Current admin session
#[openapi(tag = "Admin Auth")]
#[get("/session")]
pub fn get_session(session: AdminSession) -> Json<AdminUserResponse> {
    Json(AdminUserResponse::from(&session))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_login, post_logout, post_setup_password, post_gate_check, get_session]
}

#[cfg(test)]
mod tests {
    use crate::build_rocket;
    use crate::session::SESSION_COOKIE;
    use crate::test_utils::test_config;
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;

    async fn client_with_gate(gate_password: Option<&str>) -> Client {
        let mut config = test_config();
        config.auth.gate_password = gate_password.map(str::to_string);
        Client::tracked(build_rocket(config)).await.expect("valid rocket instance")
    }

    #[rocket::async_test]
    async fn login_with_missing_password_is_bad_request() {
        let client = client_with_gate(None).await;
        let response = client
            .post("/api/admin/login")
            .header(ContentType::JSON)
            .body(r#"{"email":"desk@fairway.test"}"#)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(
            response.into_string().await.as_deref(),
            Some(r#"{"error":"password: Email and password are required"}"#)
        );
    }

    #[rocket::async_test]
    async fn setup_with_short_password_is_bad_request() {
        let client = client_with_gate(None).await;
        let response = client
            .post("/api/admin/setup-password")
            .header(ContentType::JSON)
            .body(r#"{"email":"new@fairway.test","password":"short"}"#)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert!(response.into_string().await.unwrap_or_default().contains("at least 8 characters"));
    }

    #[rocket::async_test]
    async fn logout_clears_the_cookie() {
        let client = client_with_gate(None).await;
        let response = client
            .post("/api/admin/logout")
            .cookie(Cookie::new(SESSION_COOKIE, "whatever"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let removal = response.cookies().get(SESSION_COOKIE).expect("removal cookie is sent");
        assert_eq!(removal.value(), "");
        assert_eq!(response.into_string().await.as_deref(), Some(r#"{"ok":true}"#));
    }

    #[rocket::async_test]
    async fn gate_check_accepts_only_the_configured_password() {
        let client = client_with_gate(Some("preview-2025")).await;

        let accepted = client
            .post("/api/admin/auth")
            .header(ContentType::JSON)
            .body(r#"{"password":"preview-2025"}"#)
            .dispatch()
            .await;
        assert_eq!(accepted.status(), Status::Ok);

        let rejected = client
            .post("/api/admin/auth")
            .header(ContentType::JSON)
            .body(r#"{"password":"guess"}"#)
            .dispatch()
            .await;
        assert_eq!(rejected.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn gate_check_fails_when_unconfigured() {
        let client = client_with_gate(None).await;
        let response = client
            .post("/api/admin/auth")
            .header(ContentType::JSON)
            .body(r#"{"password":""}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn session_requires_a_cookie() {
        let client = client_with_gate(None).await;
        let response = client.get("/api/admin/session").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(response.into_string().await.as_deref(), Some(r#"{"error":"Unauthorized"}"#));
    }
}
