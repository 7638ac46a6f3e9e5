use crate::auth::AdminSession;
use crate::content::store::parse_document;
use crate::content::{GitHubContentStore, StoredDocument};
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::content::{ContentDocument, ContentKind, ContentSummary, ItemWriteRequest, ItemWriteResponse, ItemsQuery};
use rocket::http::{Header, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Request, State, get, post, put};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::openapi;
use rocket_okapi::response::OpenApiResponderInner;
use tracing::info;
use validator::Validate;

/// Either the summaries of one content type or a single document.
pub enum ItemsResponse {
    Summaries(Vec<ContentSummary>),
    /// Sent with the document's revision in the `ETag` header.
    Document(StoredDocument),
}

impl<'r> Responder<'r, 'static> for ItemsResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ItemsResponse::Summaries(summaries) => Json(summaries).respond_to(req),
            ItemsResponse::Document(stored) => {
                let mut response = Json(stored.document).respond_to(req)?;
                response.set_header(Header::new("ETag", format!("\"{}\"", stored.sha)));
                Ok(response)
            }
        }
    }
}

impl OpenApiResponderInner for ItemsResponse {
    fn responses(generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = <Json<Vec<ContentSummary>> as OpenApiResponderInner>::responses(generator)?;
        responses.responses.insert(
            "200".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Summaries of every document of the type, or the document named by `slug` with its revision in `ETag`".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

fn parse_kind(raw: Option<&str>) -> Result<ContentKind, AppError> {
    let raw = raw.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| AppError::BadRequest("Missing type".to_string()))?;
    raw.parse().map_err(|_| AppError::BadRequest(format!("Invalid type '{raw}'")))
}

/// A checked write: the slug, the typed document and the revision the editor started from.
struct ItemWrite {
    slug: String,
    document: ContentDocument,
    sha: Option<String>,
}

fn parse_write(request: ItemWriteRequest) -> Result<ItemWrite, AppError> {
    let kind = parse_kind(request.kind.as_deref())?;
    request.validate()?;

    let ItemWriteRequest { slug, data, sha, .. } = request;
    let data = data.ok_or_else(|| AppError::BadRequest("data: Document data is required".to_string()))?;
    Ok(ItemWrite {
        document: parse_document(kind, data)?,
        slug,
        sha,
    })
}

/// List content of one type, or fetch a single document
#[openapi(tag = "Content")]
#[get("/items?<query..>")]
pub async fn get_items(store: &State<GitHubContentStore>, _rate_limit: RateLimit, _session: AdminSession, query: ItemsQuery) -> Result<ItemsResponse, AppError> {
    let kind = parse_kind(query.kind.as_deref())?;

    match query.slug.as_deref().filter(|s| !s.is_empty()) {
        None => Ok(ItemsResponse::Summaries(store.list(kind).await)),
        Some(slug) => {
            let stored = store
                .get(kind, slug)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{kind} '{slug}' not found")))?;
            Ok(ItemsResponse::Document(stored))
        }
    }
}

/// Replace an existing document
///
/// Pass the `sha` received in `ETag` to have the write rejected with 409 if
/// someone else saved in the meantime.
#[openapi(tag = "Content")]
#[put("/items", data = "<payload>")]
pub async fn put_item(
    store: &State<GitHubContentStore>,
    _rate_limit: RateLimit,
    session: AdminSession,
    payload: JsonBody<ItemWriteRequest>,
) -> Result<Json<ItemWriteResponse>, AppError> {
    let ItemWrite { slug, document, sha } = parse_write(payload.into_inner())?;
    let kind = document.kind();
    let sha = store.update(&slug, document, sha.as_deref()).await?;

    info!(%kind, %slug, admin = %session.email, "admin updated content");
    Ok(Json(ItemWriteResponse { ok: true, sha }))
}

/// Create a new document
#[openapi(tag = "Content")]
#[post("/items", data = "<payload>")]
pub async fn post_item(
    store: &State<GitHubContentStore>,
    _rate_limit: RateLimit,
    session: AdminSession,
    payload: JsonBody<ItemWriteRequest>,
) -> Result<(Status, Json<ItemWriteResponse>), AppError> {
    let ItemWrite { slug, document, .. } = parse_write(payload.into_inner())?;
    let kind = document.kind();
    let sha = store.create(&slug, document).await?;

    info!(%kind, %slug, admin = %session.email, "admin created content");
    Ok((Status::Created, Json(ItemWriteResponse { ok: true, sha })))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_items, put_item, post_item]
}
