use crate::auth::AdminSession;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::lead::{LeadFilter, LeadRequest, LeadResponse, LeadsQuery, LeadsResponse};
use crate::service::lead::LeadService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;

/// List leads, newest first
///
/// `limit` defaults to 100 and is capped at 500. `status` and `region` filter on exact matches.
#[openapi(tag = "Leads")]
#[get("/leads?<query..>")]
pub async fn get_leads(pool: &State<PgPool>, _rate_limit: RateLimit, _session: AdminSession, query: LeadsQuery) -> Result<Json<LeadsResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let leads = LeadService::new(&repo).list_leads(&LeadFilter::from(query)).await?;
    Ok(Json(LeadsResponse { leads }))
}

/// Record a lead
#[openapi(tag = "Leads")]
#[post("/leads", data = "<payload>")]
pub async fn post_lead(pool: &State<PgPool>, _rate_limit: RateLimit, _session: AdminSession, payload: JsonBody<LeadRequest>) -> Result<(Status, Json<LeadResponse>), AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let lead = LeadService::new(&repo).create_lead(&payload).await?;
    Ok((Status::Created, Json(LeadResponse { lead })))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_leads, post_lead]
}

#[cfg(test)]
mod tests {
    use crate::build_rocket;
    use crate::test_utils::test_config;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn leads_require_a_session() {
        let client = Client::tracked(build_rocket(test_config())).await.expect("valid rocket instance");

        let response = client.get("/api/admin/leads?limit=5").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/admin/leads")
            .header(ContentType::JSON)
            .body(r#"{"name":"Sam","email":"sam@example.com"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
