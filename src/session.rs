//! Stateless admin session tokens.
//!
//! A token is `base64url("{email}:{issued_at_ms}:{hex(hmac_sha256(secret, "{email}:{issued_at_ms}"))}")`.
//! Nothing is stored server side: a token is valid while its signature matches
//! and it is younger than the configured TTL.

use crate::config::AuthConfig;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Method;
use rocket::http::uri::Origin;
use rocket::response::Redirect;
use rocket::{Data, Request, get, routes};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "admin_session";
pub const LOGIN_PAGE: &str = "/admin/login";

const PROTECTED_SEGMENT: &str = "admin";
const LOGIN_SEGMENT: &str = "login";
const GATE_REDIRECT_ROUTE: &str = "/_gate/login";

#[derive(Clone)]
pub struct SessionAuthenticator {
    key: HmacSha256,
    ttl: Duration,
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, InvalidLength> {
        Ok(Self {
            key: HmacSha256::new_from_slice(secret.as_ref())?,
            ttl,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, InvalidLength> {
        Self::new(&config.session_secret, Duration::from_secs(config.session_ttl_days * 24 * 60 * 60))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for an already authenticated subject.
    pub fn issue(&self, subject: &str) -> String {
        self.issue_at(subject, Utc::now().timestamp_millis())
    }

    pub fn issue_at(&self, subject: &str, issued_at_ms: i64) -> String {
        let payload = format!("{subject}:{issued_at_ms}");
        let signature = hex::encode(self.sign(&payload));
        URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}"))
    }

    /// Returns the subject of a valid token. Every failure collapses into `None`.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.verify_at(token, Utc::now().timestamp_millis())
    }

    pub fn verify_at(&self, token: &str, now_ms: i64) -> Option<String> {
        let decoded = URL_SAFE_NO_PAD.decode(token.trim().trim_end_matches('=')).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;

        // The subject may itself contain ':', so peel fields off the right.
        let mut fields = decoded.rsplitn(3, ':');
        let signature = fields.next()?;
        let issued_at = fields.next()?;
        let subject = fields.next()?;
        if subject.is_empty() {
            return None;
        }

        let signature = hex::decode(signature).ok()?;
        let mut mac = self.key.clone();
        mac.update(format!("{subject}:{issued_at}").as_bytes());
        mac.verify_slice(&signature).ok()?;

        let issued_at_ms: i64 = issued_at.parse().ok()?;
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if now_ms.saturating_sub(issued_at_ms) > ttl_ms {
            return None;
        }

        Some(subject.to_string())
    }

    /// Decide whether a page request may proceed. Only presence, signature and
    /// expiry are checked here; the user record is not consulted.
    ///
    /// `path` is the raw request path; it is normalized the way routing and the
    /// static file server see it before the decision is made.
    pub fn gate(&self, path: &str, cookie: Option<&str>) -> GateDecision {
        let Some(segments) = protected_segments(path) else {
            return GateDecision::Allow;
        };

        match cookie.and_then(|value| self.verify(value)) {
            Some(_) => GateDecision::Allow,
            None => GateDecision::Redirect(login_location(&format!("/{}", segments.join("/")))),
        }
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.key.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(String),
}

/// Percent-decoded, non-empty segments: the view Rocket routes on, so `//admin`
/// and `/%61dmin` both start with `admin`.
fn decoded_segments(path: &str) -> Vec<String> {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|raw| String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned())
        .collect()
}

/// Folds `.` and `..` the way the static file server does.
fn resolve_dot_segments(segments: &[String]) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for segment in segments {
        match segment.as_str() {
            "." => {}
            ".." => {
                resolved.pop();
            }
            _ => resolved.push(segment.clone()),
        }
    }
    resolved
}

/// The first view of `path` that falls under the gate, if any.
fn protected_segments(path: &str) -> Option<Vec<String>> {
    let decoded = decoded_segments(path);
    let resolved = resolve_dot_segments(&decoded);
    [decoded, resolved].into_iter().find(|segments| is_protected(segments))
}

/// `/admin` and everything below it, except the login page.
fn is_protected(segments: &[String]) -> bool {
    match segments {
        [first, rest @ ..] if first == PROTECTED_SEGMENT => !matches!(rest.first(), Some(next) if next == LOGIN_SEGMENT),
        _ => false,
    }
}

pub fn login_location(from: &str) -> String {
    format!("{LOGIN_PAGE}?from={}", urlencoding::encode(from))
}

/// Fairing that runs the page gate before routing. Blocked requests are
/// rewritten to an internal route that answers with a redirect to the login page.
pub struct AdminGate;

#[rocket::async_trait]
impl Fairing for AdminGate {
    fn info(&self) -> Info {
        Info {
            name: "Admin Page Gate",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let decision = {
            let Some(authenticator) = request.rocket().state::<SessionAuthenticator>() else {
                return;
            };
            let path = request.uri().path().as_str().to_string();
            let cookie = request.cookies().get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
            authenticator.gate(&path, cookie.as_deref())
        };

        if let GateDecision::Redirect(location) = decision {
            debug!(uri = %request.uri(), "admin page requested without a valid session");
            let target = format!("{GATE_REDIRECT_ROUTE}?to={}", urlencoding::encode(&location));
            match Origin::parse_owned(target) {
                Ok(uri) => {
                    request.set_method(Method::Get);
                    request.set_uri(uri);
                }
                Err(err) => warn!(error = %err, "failed to build gate redirect uri"),
            }
        }
    }
}

#[get("/_gate/login?<to>")]
fn gate_redirect(to: Option<String>) -> Redirect {
    // Only ever bounce to the login page, whatever the query says.
    match to {
        Some(location) if location == LOGIN_PAGE || location.starts_with(&format!("{LOGIN_PAGE}?")) => Redirect::to(location),
        _ => Redirect::to(LOGIN_PAGE),
    }
}

pub fn gate_routes() -> Vec<rocket::Route> {
    routes![gate_redirect]
}
