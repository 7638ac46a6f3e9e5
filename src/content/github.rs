//! GitHub contents API client.

use super::{ContentError, ContentHost, DirectoryEntry, PutFile, RemoteFile};
use crate::config::GitHubConfig;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Error body returned by the GitHub API.
#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// Response from the create/update contents endpoint
#[derive(Debug, Deserialize)]
struct PutFileResponse {
    content: PutFileContent,
}

#[derive(Debug, Deserialize)]
struct PutFileContent {
    sha: String,
}

pub struct GitHubClient {
    http_client: Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, ContentError> {
        let http_client = Client::builder()
            .user_agent(concat!("fairway-admin/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        if config.token.is_none() {
            warn!("No GitHub token configured; content writes will be rejected by GitHub");
        }

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let path = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/repos/{}/{}/contents/{}", self.api_url, self.owner, self.repo, path);
        match &self.branch {
            Some(branch) => format!("{url}?ref={}", urlencoding::encode(branch)),
            None => url,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .http_client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-success response into [`ContentError::Remote`], keeping GitHub's message.
async fn ensure_success(response: Response) -> Result<Response, ContentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubErrorBody>(&body).map(|b| b.message).unwrap_or(body);
    Err(ContentError::Remote {
        status: status.as_u16(),
        message: if message.is_empty() { format!("GitHub API error ({status})") } else { message },
    })
}

#[async_trait]
impl ContentHost for GitHubClient {
    async fn list_directory(&self, path: &str) -> Result<Option<Vec<DirectoryEntry>>, ContentError> {
        let url = self.contents_url(path);
        debug!(%path, "listing content directory");

        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let entries = ensure_success(response).await?.json::<Vec<DirectoryEntry>>().await?;
        Ok(Some(entries))
    }

    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, ContentError> {
        let url = self.contents_url(path);
        debug!(%path, "fetching content file");

        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file = ensure_success(response).await?.json::<RemoteFile>().await?;
        Ok(Some(file))
    }

    async fn put_file(&self, path: &str, request: &PutFile) -> Result<String, ContentError> {
        // The branch travels in the body for writes.
        let url = format!("{}/repos/{}/{}/contents/{}", self.api_url, self.owner, self.repo, path.trim_start_matches('/'));
        let body = PutFile {
            branch: request.branch.clone().or_else(|| self.branch.clone()),
            ..request.clone()
        };

        debug!(%path, replacing = body.sha.is_some(), "committing content file");
        let response = self.request(Method::PUT, &url).json(&body).send().await?;
        let created = ensure_success(response).await?.json::<PutFileResponse>().await?;
        Ok(created.content.sha)
    }
}
