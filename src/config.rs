use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

/// Only acceptable under the debug profile; `build_rocket` refuses to start with it otherwise.
pub const DEV_SESSION_SECRET: &str = "fairway-dev-session-secret-do-not-use-in-production";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub github: GitHubConfig,
    pub content: ContentConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub additional_base_paths: Vec<String>,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub read_limit: u32,
    pub mutation_limit: u32,
    pub auth_limit: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// HMAC key for admin session tokens.
    pub session_secret: String,
    pub session_ttl_days: u64,
    /// Adds the `Secure` attribute to the session cookie. Enable in production.
    pub secure_cookies: bool,
    /// Shared password for the simple gate check endpoint. The check always fails when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContentConfig {
    /// Repository directory holding the `courses/`, `hotels/` and `venues/` namespaces.
    pub root: String,
    /// Upper bound on concurrent file fetches while listing a namespace.
    pub list_concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SiteConfig {
    /// Directory of prebuilt site pages served at `/`. Nothing is served when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fairway".to_string(),
            max_connections: 8,
            min_connections: 0,
            acquire_timeout: 5,
            run_migrations: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            additional_base_paths: Vec::new(),
            enable_swagger: true,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_limit: 300,
            mutation_limit: 60,
            auth_limit: 10,
            window_seconds: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: DEV_SESSION_SECRET.to_string(),
            session_ttl_days: 7,
            secure_cookies: false,
            gate_password: None,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            branch: None,
            token: None,
            timeout_seconds: 15,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: "content".to_string(),
            list_concurrency: 8,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Fairway.toml (base configuration file)
    /// 3. Environment variables prefixed with FAIRWAY_, nested with `__`
    ///    (e.g. FAIRWAY_AUTH__SESSION_SECRET, FAIRWAY_GITHUB__OWNER)
    /// 4. Conventional unprefixed variables: DATABASE_URL, GITHUB_TOKEN, SESSION_SECRET, ADMIN_PASSWORD
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("Fairway.toml").nested())
            .merge(Env::prefixed("FAIRWAY_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["GITHUB_TOKEN"]).map(|_| "github.token".into()))
            .merge(Env::raw().only(&["SESSION_SECRET"]).map(|_| "auth.session_secret".into()))
            .merge(Env::raw().only(&["ADMIN_PASSWORD"]).map(|_| "auth.gate_password".into()))
    }
}
