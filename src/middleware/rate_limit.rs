//! Fixed-window request limits.
//!
//! Each request counts against its client address and, when the session cookie
//! verifies, against the admin's account. Login and password setup also count
//! against the submitted email, so one account cannot be guessed at from many
//! addresses.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::auth::session_subject;
use crate::config::RateLimitConfig;
use crate::error::app_error::AppError;
use crate::middleware::RequestId;
use crate::service::auth::normalize_email;
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tokio::sync::Mutex;
use tracing::warn;

/// Expired windows are swept once the table holds more entries than this.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    Read,
    Mutation,
    Auth,
}

impl Bucket {
    fn for_method(method: Method) -> Self {
        if method.supports_payload() { Bucket::Mutation } else { Bucket::Read }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Subject {
    /// `None` groups every request whose address is unknown.
    Client(Option<IpAddr>),
    /// Normalized admin email.
    Account(String),
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    read_limit: u32,
    mutation_limit: u32,
    auth_limit: u32,
    window: Duration,
    windows: Mutex<HashMap<(Subject, Bucket), Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            read_limit: config.read_limit,
            mutation_limit: config.mutation_limit,
            auth_limit: config.auth_limit,
            window: Duration::from_secs(config.window_seconds.max(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn limit(&self, bucket: Bucket) -> u32 {
        match bucket {
            Bucket::Read => self.read_limit,
            Bucket::Mutation => self.mutation_limit,
            Bucket::Auth => self.auth_limit,
        }
    }

    /// Counts one hit for every subject, or none at all when any of them is
    /// over the limit. The error is how long until the last of them frees up.
    async fn hit(&self, subjects: &[Subject], bucket: Bucket) -> Result<(), Duration> {
        let limit = self.limit(bucket);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, entry| now.duration_since(entry.started) < window);
        }

        let mut wait: Option<Duration> = None;
        for subject in subjects {
            let entry = windows.entry((subject.clone(), bucket)).or_insert(Window { started: now, hits: 0 });
            if now.duration_since(entry.started) >= self.window {
                *entry = Window { started: now, hits: 0 };
            }
            if entry.hits >= limit {
                let remaining = self.window.saturating_sub(now.duration_since(entry.started));
                wait = Some(wait.map_or(remaining, |longest| longest.max(remaining)));
            }
        }

        if let Some(wait) = wait {
            return Err(wait);
        }

        for subject in subjects {
            if let Some(entry) = windows.get_mut(&(subject.clone(), bucket)) {
                entry.hits += 1;
            }
        }
        Ok(())
    }
}

/// Seconds until a limited caller may retry; read by the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryAfter(pub u64);

impl RetryAfter {
    /// Rounds up so a client that waits the advertised time finds the window open.
    fn from_wait(wait: Duration) -> Self {
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        RetryAfter(secs.max(1))
    }
}

fn client_subject(request: &Request<'_>) -> Subject {
    let ip = request.client_ip();
    if ip.is_none() {
        warn!(uri = %request.uri(), "client address unavailable; sharing the anonymous rate limit");
    }
    Subject::Client(ip)
}

async fn limit_request<T>(request: &Request<'_>, subjects: &[Subject], bucket: Bucket, pass: T) -> Outcome<T, RetryAfter> {
    let Some(limiter) = request.rocket().state::<RateLimiter>() else {
        return Outcome::Success(pass);
    };

    match limiter.hit(subjects, bucket).await {
        Ok(()) => Outcome::Success(pass),
        Err(wait) => {
            let retry_after = RetryAfter::from_wait(wait);
            request.local_cache(|| Some(retry_after));

            let request_id = request.local_cache(|| None::<RequestId>).as_ref().map(|r| r.0.clone()).unwrap_or_default();
            warn!(
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                retry_after_secs = retry_after.0,
                ?bucket,
                "rate limit exceeded"
            );
            Outcome::Error((Status::TooManyRequests, retry_after))
        }
    }
}

/// Limits a request by client address and, for signed-in admins, by account.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimit;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimit {
    type Error = RetryAfter;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut subjects = vec![client_subject(request)];
        if let Some(email) = session_subject(request) {
            subjects.push(Subject::Account(email));
        }
        limit_request(request, &subjects, Bucket::for_method(request.method()), RateLimit).await
    }
}

/// Limits credential checks by client address. Handlers that know which
/// account is targeted also call [`AuthRateLimit::check_account`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthRateLimit<'r> {
    limiter: Option<&'r RateLimiter>,
}

impl AuthRateLimit<'_> {
    pub async fn check_account(&self, email: &str) -> Result<(), AppError> {
        let Some(limiter) = self.limiter else {
            return Ok(());
        };

        let email = normalize_email(email);
        let account = [Subject::Account(email.clone())];
        limiter.hit(&account, Bucket::Auth).await.map_err(|wait| {
            let RetryAfter(retry_after_secs) = RetryAfter::from_wait(wait);
            warn!(email = %email, retry_after_secs, "too many attempts for account");
            AppError::TooManyRequests { retry_after_secs }
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthRateLimit<'r> {
    type Error = RetryAfter;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let guard = AuthRateLimit {
            limiter: request.rocket().state::<RateLimiter>(),
        };
        limit_request(request, &[client_subject(request)], Bucket::Auth, guard).await
    }
}

impl<'a> OpenApiFromRequest<'a> for RateLimit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        too_many_requests_response()
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthRateLimit<'a> {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        too_many_requests_response()
    }
}

fn too_many_requests_response() -> rocket_okapi::Result<Responses> {
    let mut responses = Responses::default();
    responses.responses.insert(
        "429".to_string(),
        RefOr::Object(OpenApiResponse {
            description: "Too Many Requests".to_string(),
            ..Default::default()
        }),
    );
    Ok(responses)
}
