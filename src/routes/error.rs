use crate::error::app_error::ErrorBody;
use crate::error::json::BodyRejection;
use crate::middleware::rate_limit::RetryAfter;
use rocket::http::{ContentType, Header, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response, catch};
use std::io::Cursor;

/// JSON catcher body; `Retry-After` is attached when a rate limit tripped.
pub struct CaughtError {
    status: Status,
    message: String,
    retry_after: Option<u64>,
}

impl CaughtError {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }
}

impl<'r> Responder<'r, 'static> for CaughtError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = ErrorBody::new(self.message).to_json();
        let mut response = Response::build();
        response.status(self.status).header(ContentType::JSON).sized_body(body.len(), Cursor::new(body));
        if let Some(seconds) = self.retry_after {
            response.header(Header::new("Retry-After", seconds.to_string()));
        }
        response.ok()
    }
}

#[catch(400)]
pub fn bad_request(req: &Request) -> CaughtError {
    match req.local_cache(|| None::<BodyRejection>) {
        Some(rejection) => CaughtError::new(Status::BadRequest, rejection.0.clone()),
        None => CaughtError::new(Status::BadRequest, "Bad request"),
    }
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> CaughtError {
    CaughtError::new(Status::Unauthorized, "Unauthorized")
}

#[catch(404)]
pub fn not_found(_: &Request) -> CaughtError {
    CaughtError::new(Status::NotFound, "Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> CaughtError {
    CaughtError::new(Status::Conflict, "Conflict")
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> CaughtError {
    CaughtError::new(Status::BadRequest, "Invalid request")
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> CaughtError {
    let retry_after = req.local_cache(|| None::<RetryAfter>).as_ref().map(|r| r.0);
    CaughtError {
        retry_after,
        ..CaughtError::new(Status::TooManyRequests, "Too many requests")
    }
}

#[catch(500)]
pub fn internal_error(_: &Request) -> CaughtError {
    CaughtError::new(Status::InternalServerError, "Internal server error")
}
