mod auth;
mod config;
mod content;
mod database;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;
mod session;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::content::{ContentStore, GitHubClient};
use crate::db::stage_db;
use crate::middleware::RequestLogger;
use crate::middleware::rate_limit::RateLimiter;
use crate::routes as app_routes;
use crate::session::{AdminGate, SessionAuthenticator, gate_routes};
use rocket::fs::FileServer;
use rocket::{Build, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG takes precedence over the configured level, e.g.
    //   RUST_LOG=fairway_admin::content=debug  - trace GitHub calls
    //   RUST_LOG=info,rocket=warn              - quieter Rocket
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // A subscriber may already be installed when several rockets are built in one process.
    let _ = if json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

fn ensure_session_secret(auth_config: &config::AuthConfig) {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    if profile != "debug" && (auth_config.session_secret.is_empty() || auth_config.session_secret == config::DEV_SESSION_SECRET) {
        panic!(
            "A session secret is required for profile '{}'. Set SESSION_SECRET (generate one with: openssl rand -base64 32)",
            profile
        );
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    // The session travels in a cookie, so credentials and a wildcard origin cannot mix.
    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Accept"]),
        expose_headers: ["ETag", "X-Request-Id"].iter().map(|h| h.to_string()).collect(),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

fn collect_base_paths(api_config: &config::ApiConfig) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    let mut push_unique = |path: String| {
        if !normalized.contains(&path) {
            normalized.push(path);
        }
    };

    push_unique(normalize_base_path(&api_config.base_path));
    for extra in &api_config.additional_base_paths {
        push_unique(normalize_base_path(extra));
    }

    normalized
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

fn collect_route_specs() -> Vec<RouteSpec> {
    let (auth_routes, auth_openapi) = app_routes::admin_auth::routes();
    let (item_routes, item_openapi) = app_routes::items::routes();
    let (lead_routes, lead_openapi) = app_routes::leads::routes();
    let (stats_routes, stats_openapi) = app_routes::stats::routes();
    let (health_routes, health_openapi) = app_routes::health::routes();

    vec![
        RouteSpec {
            path: "/admin",
            routes: auth_routes,
            openapi: auth_openapi,
        },
        RouteSpec {
            path: "/admin",
            routes: item_routes,
            openapi: item_openapi,
        },
        RouteSpec {
            path: "/admin",
            routes: lead_routes,
            openapi: lead_openapi,
        },
        RouteSpec {
            path: "/admin",
            routes: stats_routes,
            openapi: stats_openapi,
        },
        RouteSpec {
            path: "/health",
            routes: health_routes,
            openapi: health_openapi,
        },
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Rocket<Build> {
    let route_specs = collect_route_specs();

    if enable_swagger {
        let mut openapi_list = Vec::new();
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
            openapi_list.push((spec.path, spec.openapi));
        }

        let openapi_docs = match marge_spec_list(&openapi_list) {
            Ok(docs) => docs,
            Err(err) => panic!("Could not merge OpenAPI spec: {}", err),
        };

        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);

        let docs_path = join_base_path(base_path, "docs");
        let openapi_url = join_base_path(base_path, "openapi.json");
        rocket = rocket.mount(docs_path, make_swagger_ui(&get_swagger_config(&openapi_url)));
    } else {
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
        }
    }

    rocket.register(
        base_path,
        catchers![
            app_routes::error::bad_request,
            app_routes::error::unauthorized,
            app_routes::error::not_found,
            app_routes::error::conflict,
            app_routes::error::unprocessable_entity,
            app_routes::error::too_many_requests,
            app_routes::error::internal_error,
        ],
    )
}

/// Serves prebuilt site pages when a static directory is configured and present.
fn mount_static_site(rocket: Rocket<Build>, site_config: &config::SiteConfig) -> Rocket<Build> {
    match site_config.static_dir.as_deref() {
        Some(dir) if Path::new(dir).is_dir() => rocket.mount("/", FileServer::from(dir)),
        Some(dir) => {
            tracing::warn!(static_dir = %dir, "static site directory not found; not serving pages");
            rocket
        }
        None => rocket,
    }
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_session_secret(&config.auth);

    let cors = build_cors(&config.cors).to_cors().expect("Failed to create CORS fairing");
    let authenticator = SessionAuthenticator::from_config(&config.auth).expect("HMAC accepts keys of any length");
    let github = GitHubClient::new(&config.github).expect("Failed to create GitHub client");
    let store = ContentStore::new(github, &config.content);

    let base_paths = collect_base_paths(&config.api);

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let mut rocket = rocket::custom(figment)
        .attach(cors)
        .attach(RequestLogger)
        .attach(AdminGate)
        .attach(stage_db(config.database.clone()))
        .manage(RateLimiter::new(&config.rate_limit))
        .manage(authenticator)
        .manage(store)
        .mount("/", gate_routes());

    for base_path in &base_paths {
        rocket = mount_api_routes(rocket, base_path, config.api.enable_swagger);
    }

    rocket = mount_static_site(rocket, &config.site);

    rocket.manage(config)
}
