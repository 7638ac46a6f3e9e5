//! JSON documents kept as files in a GitHub repository.
//!
//! [`ContentHost`] is the file-level seam (list a directory, read a file,
//! write a file with a revision precondition); [`ContentStore`] builds the
//! typed document operations on top of it.

pub mod github;
pub mod store;

pub use github::GitHubClient;
pub use store::{ContentStore, StoredDocument};

/// The store as managed by the application.
pub type GitHubContentStore = ContentStore<GitHubClient>;

use crate::models::content::ContentKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{kind} '{slug}' not found")]
    NotFound { kind: ContentKind, slug: String },
    #[error("{kind} '{slug}' already exists")]
    AlreadyExists { kind: ContentKind, slug: String },
    #[error("Invalid slug '{0}'")]
    InvalidSlug(String),
    #[error("Document slug '{found}' does not match '{expected}'")]
    SlugMismatch { expected: String, found: String },
    #[error("Invalid document: {0}")]
    InvalidDocument(#[source] serde_json::Error),
    #[error("{}", crate::error::app_error::validation_message(.0))]
    Validation(#[from] ValidationErrors),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    /// Non-success answer from the host, e.g. 409 when the revision is stale.
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("Content host request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl DirectoryEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "file"
    }
}

/// A file as returned by the host: base64 content plus its revision (blob SHA).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: String,
}

/// Body of a create/update commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutFile {
    pub message: String,
    /// Base64 encoded file content.
    pub content: String,
    /// Required when replacing an existing file; must be its current revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[async_trait]
pub trait ContentHost: Send + Sync {
    /// `Ok(None)` when the directory does not exist.
    async fn list_directory(&self, path: &str) -> Result<Option<Vec<DirectoryEntry>>, ContentError>;

    /// `Ok(None)` when the file does not exist.
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, ContentError>;

    /// Create or replace a file, returning the new revision.
    async fn put_file(&self, path: &str, request: &PutFile) -> Result<String, ContentError>;
}
