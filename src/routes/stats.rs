use crate::auth::AdminSession;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::lead::StatsResponse;
use crate::service::lead::LeadService;
use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use sqlx::PgPool;

/// Lead counts for the dashboard
///
/// `active` counts leads that are neither booked nor lost; `last7Days` counts
/// leads created in the trailing seven days.
#[openapi(tag = "Leads")]
#[get("/stats")]
pub async fn get_stats(pool: &State<PgPool>, _rate_limit: RateLimit, _session: AdminSession) -> Result<Json<StatsResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let stats = LeadService::new(&repo).stats(Utc::now()).await?;
    Ok(Json(stats))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_stats]
}
