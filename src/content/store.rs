use super::{ContentError, ContentHost, DirectoryEntry, PutFile, RemoteFile};
use crate::config::ContentConfig;
use crate::models::content::{ContentDocument, ContentKind, ContentSummary, is_valid_slug, sort_summaries};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

/// A document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub document: ContentDocument,
    pub sha: String,
}

pub struct ContentStore<H> {
    host: H,
    root: String,
    list_concurrency: usize,
}

impl<H: ContentHost> ContentStore<H> {
    pub fn new(host: H, config: &ContentConfig) -> Self {
        Self {
            host,
            root: config.root.trim_matches('/').to_string(),
            list_concurrency: config.list_concurrency.max(1),
        }
    }

    #[cfg(test)]
    pub fn host(&self) -> &H {
        &self.host
    }

    fn directory(&self, kind: ContentKind) -> String {
        if self.root.is_empty() {
            kind.directory().to_string()
        } else {
            format!("{}/{}", self.root, kind.directory())
        }
    }

    fn document_path(&self, kind: ContentKind, slug: &str) -> String {
        format!("{}/{slug}.json", self.directory(kind))
    }

    /// Summaries of every document of one type, sorted by name.
    ///
    /// Never fails: an unlistable namespace yields an empty list and an
    /// unreadable file yields a summary derived from its file name.
    pub async fn list(&self, kind: ContentKind) -> Vec<ContentSummary> {
        let directory = self.directory(kind);
        let entries = match self.host.list_directory(&directory).await {
            Ok(Some(entries)) => entries,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%kind, %directory, error = %err, "failed to list content directory");
                return Vec::new();
            }
        };

        let documents = entries.into_iter().filter(|entry| entry.is_file() && entry.name.ends_with(".json"));
        let mut summaries: Vec<ContentSummary> = stream::iter(documents)
            .map(|entry| self.summarize(kind, entry))
            .buffer_unordered(self.list_concurrency)
            .collect()
            .await;

        sort_summaries(&mut summaries);
        summaries
    }

    async fn summarize(&self, kind: ContentKind, entry: DirectoryEntry) -> ContentSummary {
        let slug = entry.name.strip_suffix(".json").unwrap_or(&entry.name).to_string();

        let file = match self.host.get_file(&entry.path).await {
            Ok(Some(file)) => file,
            Ok(None) => return ContentSummary::from_file_name(kind, &slug),
            Err(err) => {
                warn!(%kind, %slug, error = %err, "failed to fetch content file");
                return ContentSummary::from_file_name(kind, &slug);
            }
        };

        match decode_document(kind, &slug, &file) {
            Ok(document) => ContentSummary::from_document(&document),
            Err(err) => {
                warn!(%kind, %slug, error = %err, "failed to decode content file");
                ContentSummary::from_file_name(kind, &slug)
            }
        }
    }

    pub async fn get(&self, kind: ContentKind, slug: &str) -> Result<Option<StoredDocument>, ContentError> {
        ensure_slug(slug)?;

        let Some(file) = self.host.get_file(&self.document_path(kind, slug)).await? else {
            return Ok(None);
        };

        let document = decode_document(kind, slug, &file)?;
        Ok(Some(StoredDocument { document, sha: file.sha }))
    }

    /// Commit a new document. Refuses to overwrite an existing file.
    pub async fn create(&self, slug: &str, document: ContentDocument) -> Result<String, ContentError> {
        let kind = document.kind();
        let document = prepare(slug, document)?;
        let path = self.document_path(kind, slug);

        if self.host.get_file(&path).await?.is_some() {
            return Err(ContentError::AlreadyExists {
                kind,
                slug: slug.to_string(),
            });
        }

        let request = PutFile {
            message: format!("Create {kind}: {}", document.display_name()),
            content: encode_document(&document)?,
            sha: None,
            branch: None,
        };

        let sha = self.host.put_file(&path, &request).await?;
        info!(%kind, %slug, %sha, "content document created");
        Ok(sha)
    }

    /// Replace an existing document.
    ///
    /// The write carries `expected_sha` when given, otherwise the revision read
    /// just before writing. A stale revision is rejected by the host and that
    /// rejection is returned unchanged.
    pub async fn update(&self, slug: &str, document: ContentDocument, expected_sha: Option<&str>) -> Result<String, ContentError> {
        let kind = document.kind();
        let document = prepare(slug, document)?;
        let path = self.document_path(kind, slug);

        let current = self.host.get_file(&path).await?.ok_or_else(|| ContentError::NotFound {
            kind,
            slug: slug.to_string(),
        })?;

        let request = PutFile {
            message: format!("Update {kind}: {}", document.display_name()),
            content: encode_document(&document)?,
            sha: Some(expected_sha.map(str::to_string).unwrap_or(current.sha)),
            branch: None,
        };

        let sha = self.host.put_file(&path, &request).await?;
        info!(%kind, %slug, %sha, "content document updated");
        Ok(sha)
    }
}

fn ensure_slug(slug: &str) -> Result<(), ContentError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ContentError::InvalidSlug(slug.to_string()))
    }
}

/// Pins the document to the addressed slug and validates it.
fn prepare(slug: &str, mut document: ContentDocument) -> Result<ContentDocument, ContentError> {
    ensure_slug(slug)?;

    let fields = document.fields_mut();
    if fields.slug.is_empty() {
        fields.slug = slug.to_string();
    } else if fields.slug != slug {
        return Err(ContentError::SlugMismatch {
            expected: slug.to_string(),
            found: fields.slug.clone(),
        });
    }

    document.validate()?;
    Ok(document)
}

/// Parse a raw request payload into a typed document.
pub fn parse_document(kind: ContentKind, data: Value) -> Result<ContentDocument, ContentError> {
    ContentDocument::from_value(kind, data).map_err(ContentError::InvalidDocument)
}

fn encode_document(document: &ContentDocument) -> Result<String, ContentError> {
    let mut json = serde_json::to_string_pretty(document).map_err(ContentError::InvalidDocument)?;
    json.push('\n');
    Ok(STANDARD.encode(json))
}

/// The host wraps base64 content at 60 columns, so whitespace is dropped before decoding.
fn decode_document(kind: ContentKind, slug: &str, file: &RemoteFile) -> Result<ContentDocument, ContentError> {
    let decode_error = |reason: String| ContentError::Decode {
        path: file.path.clone(),
        reason,
    };

    let compact: String = file.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| decode_error(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| decode_error(e.to_string()))?;

    let mut document = ContentDocument::from_value(kind, value).map_err(|e| decode_error(e.to_string()))?;
    if document.fields().slug.is_empty() {
        document.fields_mut().slug = slug.to_string();
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryContentHost;
    use serde_json::json;

    fn store(host: InMemoryContentHost, list_concurrency: usize) -> ContentStore<InMemoryContentHost> {
        ContentStore::new(
            host,
            &ContentConfig {
                root: "content".to_string(),
                list_concurrency,
            },
        )
    }

    fn course(slug: &str, name: &str) -> ContentDocument {
        ContentDocument::from_value(ContentKind::Course, json!({"slug": slug, "name": name, "region": "Scotland"})).unwrap()
    }

    #[tokio::test]
    async fn list_of_missing_namespace_is_empty() {
        let store = store(InMemoryContentHost::default(), 4);
        assert!(store.list(ContentKind::Venue).await.is_empty());
    }

    #[tokio::test]
    async fn list_is_empty_when_directory_listing_fails() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/links.json", &json!({"slug": "links", "name": "Links"}));
        host.fail_listing();

        let store = store(host, 4);
        assert!(store.list(ContentKind::Course).await.is_empty());
    }

    #[tokio::test]
    async fn list_sorts_by_name_ignoring_case() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/zeta.json", &json!({"slug": "zeta", "name": "Zeta"}));
        host.insert_json("content/courses/alpha.json", &json!({"slug": "alpha", "name": "alpha"}));
        host.insert_json("content/courses/beta.json", &json!({"slug": "beta", "name": "Beta"}));
        host.insert_json("content/hotels/the-lodge.json", &json!({"slug": "the-lodge", "name": "The Lodge"}));

        let names: Vec<String> = store(host, 2).list(ContentKind::Course).await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "Beta", "Zeta"]);
    }

    #[tokio::test]
    async fn list_degrades_unreadable_files_to_file_name() {
        let host = InMemoryContentHost::default();
        host.insert_json(
            "content/hotels/the-lodge.json",
            &json!({"slug": "the-lodge", "name": "The Lodge", "region": "Fife", "heroImage": "/img/lodge.jpg"}),
        );
        host.insert_raw("content/hotels/broken.json", "not json at all");
        host.insert_json("content/hotels/missing.json", &json!({"slug": "missing", "name": "Missing"}));
        host.fail_reads_of("content/hotels/missing.json");

        let summaries = store(host, 4).list(ContentKind::Hotel).await;
        assert_eq!(summaries.len(), 3);

        let lodge = summaries.iter().find(|s| s.slug == "the-lodge").unwrap();
        assert_eq!(lodge.region.as_deref(), Some("Fife"));
        assert_eq!(lodge.hero_image.as_deref(), Some("/img/lodge.jpg"));

        let broken = summaries.iter().find(|s| s.slug == "broken").unwrap();
        assert_eq!(broken.name, "broken");
        assert_eq!(broken.kind, ContentKind::Hotel);
        assert!(broken.region.is_none());

        assert!(summaries.iter().any(|s| s.slug == "missing" && s.name == "missing"));
    }

    #[tokio::test]
    async fn list_fan_out_is_bounded() {
        let host = InMemoryContentHost::default();
        for i in 0..25 {
            host.insert_json(&format!("content/venues/venue-{i}.json"), &json!({"slug": format!("venue-{i}"), "name": format!("Venue {i:02}")}));
        }

        let store = store(host, 3);
        let summaries = store.list(ContentKind::Venue).await;

        assert_eq!(summaries.len(), 25);
        assert_eq!(summaries.first().map(|s| s.name.as_str()), Some("Venue 00"));
        assert!(store.host().max_concurrent_reads() <= 3);
    }

    #[tokio::test]
    async fn get_decodes_wrapped_base64() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/links.json", &json!({"name": "The Links", "holes": 18, "designer": "Old Tom Morris"}));

        let stored = store(host, 4).get(ContentKind::Course, "links").await.unwrap().unwrap();
        assert_eq!(stored.document.fields().name, "The Links");
        // Slug filled from the file name.
        assert_eq!(stored.document.fields().slug, "links");
        assert!(!stored.sha.is_empty());
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = store(InMemoryContentHost::default(), 4);
        assert!(store.get(ContentKind::Course, "nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_rejects_path_like_slugs() {
        let store = store(InMemoryContentHost::default(), 4);
        assert!(matches!(store.get(ContentKind::Course, "../config").await, Err(ContentError::InvalidSlug(_))));
    }

    #[tokio::test]
    async fn create_writes_new_document() {
        let store = store(InMemoryContentHost::default(), 4);
        store.create("links", course("links", "The Links")).await.unwrap();

        let stored = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        assert_eq!(stored.document.fields().name, "The Links");
        assert_eq!(store.host().last_commit_message().as_deref(), Some("Create course: The Links"));
    }

    #[tokio::test]
    async fn create_refuses_existing_slug_without_overwriting() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/links.json", &json!({"slug": "links", "name": "Original"}));
        let store = store(host, 4);

        let result = store.create("links", course("links", "Replacement")).await;
        assert!(matches!(result, Err(ContentError::AlreadyExists { .. })));

        let stored = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        assert_eq!(stored.document.fields().name, "Original");
        assert_eq!(store.host().commit_count(), 0);
    }

    #[tokio::test]
    async fn create_rejects_invalid_documents() {
        let store = store(InMemoryContentHost::default(), 4);

        let nameless = ContentDocument::from_value(ContentKind::Course, json!({"slug": "links"})).unwrap();
        assert!(matches!(store.create("links", nameless).await, Err(ContentError::Validation(_))));

        assert!(matches!(
            store.create("other", course("links", "Links")).await,
            Err(ContentError::SlugMismatch { .. })
        ));
        assert_eq!(store.host().commit_count(), 0);
    }

    #[tokio::test]
    async fn update_with_fresh_revision_succeeds() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/links.json", &json!({"slug": "links", "name": "Links"}));
        let store = store(host, 4);

        let fresh = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        let new_sha = store.update("links", course("links", "The Links"), Some(&fresh.sha)).await.unwrap();

        let stored = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        assert_eq!(stored.sha, new_sha);
        assert_eq!(stored.document.fields().name, "The Links");
        assert_eq!(store.host().last_commit_message().as_deref(), Some("Update course: The Links"));
    }

    #[tokio::test]
    async fn update_with_stale_revision_is_rejected() {
        let host = InMemoryContentHost::default();
        host.insert_json("content/courses/links.json", &json!({"slug": "links", "name": "Links"}));
        let store = store(host, 4);

        let read = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        store.update("links", course("links", "Edited elsewhere"), None).await.unwrap();

        let result = store.update("links", course("links", "My edit"), Some(&read.sha)).await;
        assert!(matches!(result, Err(ContentError::Remote { status: 409, .. })));

        let stored = store.get(ContentKind::Course, "links").await.unwrap().unwrap();
        assert_eq!(stored.document.fields().name, "Edited elsewhere");
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = store(InMemoryContentHost::default(), 4);
        let result = store.update("links", course("links", "Links"), None).await;
        assert!(matches!(result, Err(ContentError::NotFound { .. })));
    }

    #[test]
    fn encoded_document_round_trips_through_decoder() {
        let document = course("links", "Links");
        let file = RemoteFile {
            path: "content/courses/links.json".to_string(),
            sha: "abc".to_string(),
            content: encode_document(&document).unwrap(),
        };
        assert_eq!(decode_document(ContentKind::Course, "links", &file).unwrap(), document);
    }
}
