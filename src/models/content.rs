use rocket::FromForm;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError, ValidationErrors};

/// Document namespaces in the content repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[serde(alias = "courses")]
    Course,
    #[serde(alias = "hotels")]
    Hotel,
    #[serde(alias = "venues")]
    Venue,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Course, ContentKind::Hotel, ContentKind::Venue];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Course => "course",
            ContentKind::Hotel => "hotel",
            ContentKind::Venue => "venue",
        }
    }

    /// Directory name under the content root.
    pub fn directory(&self) -> &'static str {
        match self {
            ContentKind::Course => "courses",
            ContentKind::Hotel => "hotels",
            ContentKind::Venue => "venues",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| value.eq_ignore_ascii_case(kind.as_str()) || value.eq_ignore_ascii_case(kind.directory()))
            .ok_or_else(|| format!("Unknown content type '{value}'"))
    }
}

/// Slugs are lowercase kebab-case: `pebble-beach`, `old-course-2`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 128
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug").with_message("slug must be lowercase letters, digits and single hyphens".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct GeoPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct Faq {
    #[validate(length(min = 1, message = "question is required"))]
    pub question: String,
    #[validate(length(min = 1, message = "answer is required"))]
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[validate(schema(function = "validate_price_range"))]
pub struct PriceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

fn validate_price_range(range: &PriceRange) -> Result<(), ValidationError> {
    match (range.from, range.to) {
        (Some(from), Some(to)) if to < from => Err(ValidationError::new("price_range_inverted").with_message("'to' must not be below 'from'".into())),
        _ => Ok(()),
    }
}

/// Fields shared by every document type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFields {
    /// Filled from the file name when a stored document omits it.
    #[serde(default)]
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub geo: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub faqs: Vec<Faq>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseDocument {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: DocumentFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 72))]
    pub holes: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub par: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub green_fee: Option<PriceRange>,
    /// Unmodelled fields, kept so a round trip never drops data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HotelDocument {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: DocumentFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 5))]
    pub stars: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nearby_courses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub price_per_night: Option<PriceRange>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VenueDocument {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: DocumentFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub price_per_head: Option<PriceRange>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A content document; the variant is the document's type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentDocument {
    Course(CourseDocument),
    Hotel(HotelDocument),
    Venue(VenueDocument),
}

impl ContentDocument {
    pub fn from_value(kind: ContentKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ContentKind::Course => ContentDocument::Course(serde_json::from_value(value)?),
            ContentKind::Hotel => ContentDocument::Hotel(serde_json::from_value(value)?),
            ContentKind::Venue => ContentDocument::Venue(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentDocument::Course(_) => ContentKind::Course,
            ContentDocument::Hotel(_) => ContentKind::Hotel,
            ContentDocument::Venue(_) => ContentKind::Venue,
        }
    }

    pub fn fields(&self) -> &DocumentFields {
        match self {
            ContentDocument::Course(doc) => &doc.fields,
            ContentDocument::Hotel(doc) => &doc.fields,
            ContentDocument::Venue(doc) => &doc.fields,
        }
    }

    pub fn fields_mut(&mut self) -> &mut DocumentFields {
        match self {
            ContentDocument::Course(doc) => &mut doc.fields,
            ContentDocument::Hotel(doc) => &mut doc.fields,
            ContentDocument::Venue(doc) => &mut doc.fields,
        }
    }

    /// Name used in commit messages; falls back to the slug.
    pub fn display_name(&self) -> &str {
        let fields = self.fields();
        if fields.name.trim().is_empty() { &fields.slug } else { &fields.name }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ContentDocument::Course(doc) => doc.validate(),
            ContentDocument::Hotel(doc) => doc.validate(),
            ContentDocument::Venue(doc) => doc.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub region: Option<String>,
    pub hero_image: Option<String>,
}

impl ContentSummary {
    pub fn from_document(document: &ContentDocument) -> Self {
        let fields = document.fields();
        Self {
            slug: fields.slug.clone(),
            name: fields.name.clone(),
            kind: document.kind(),
            region: fields.region.clone(),
            hero_image: fields.hero_image.clone(),
        }
    }

    /// Best-effort entry for a file that could not be fetched or decoded.
    pub fn from_file_name(kind: ContentKind, slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: slug.to_string(),
            kind,
            region: None,
            hero_image: None,
        }
    }
}

/// Orders summaries by case-insensitive name, then slug.
pub fn sort_summaries(summaries: &mut [ContentSummary]) {
    summaries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.slug.cmp(&b.slug)));
}

#[derive(Debug, FromForm, JsonSchema)]
pub struct ItemsQuery {
    #[field(name = "type")]
    #[schemars(rename = "type")]
    pub kind: Option<String>,
    pub slug: Option<String>,
}

/// Every field defaults so that a missing one is reported by name rather than
/// as a parse error.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ItemWriteRequest {
    /// `course`, `hotel` or `venue` (plural forms accepted).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Slug is required"))]
    pub slug: String,
    #[serde(default)]
    pub data: Option<Value>,
    /// Revision the editor started from. Updates fall back to the current revision when omitted.
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ItemWriteResponse {
    pub ok: bool,
    pub sha: String,
}
