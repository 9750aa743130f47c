//! Core data types shared by the generation, media and publishing stages

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_CATEGORY_CHARS: usize = 20;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 20;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_LINK_CHARS: usize = 200;

pub const DEFAULT_CATEGORY: &str = "other";

/// Resource description as submitted by a caller (API body or resources.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescription {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub download_link: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidResource {
    #[error("缺少资源标题")]
    MissingTitle,
}

/// A resource whose fields have been cleaned and bounded. Only this type is
/// handed to prompt rendering and outbound requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub description: String,
    pub download_link: Option<String>,
}

impl ResourceDescription {
    pub fn sanitize(&self) -> Result<Resource, InvalidResource> {
        let title = clean_field(&self.title, MAX_TITLE_CHARS);
        if title.is_empty() {
            return Err(InvalidResource::MissingTitle);
        }

        let category = self
            .category
            .as_deref()
            .map(|c| clean_field(c, MAX_CATEGORY_CHARS))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let tags = self
            .tags
            .iter()
            .map(|t| clean_field(t, MAX_TAG_CHARS))
            .filter(|t| !t.is_empty())
            .take(MAX_TAGS)
            .collect();

        let description = self
            .description
            .as_deref()
            .map(|d| clean_field(d, MAX_DESCRIPTION_CHARS))
            .unwrap_or_default();

        let download_link = self
            .download_link
            .as_deref()
            .map(|l| clean_field(l, MAX_LINK_CHARS))
            .filter(|l| !l.is_empty());

        Ok(Resource {
            title,
            category,
            tags,
            description,
            download_link,
        })
    }
}

impl Resource {
    pub fn tags_joined(&self, sep: &str) -> String {
        self.tags.join(sep)
    }
}

/// Replace control characters and angle brackets, trim, then cut to `max` chars.
fn clean_field(raw: &str, max: usize) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() || c == '<' || c == '>' { ' ' } else { c })
        .collect();
    truncate_chars(cleaned.trim(), max)
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Structured article produced by a provider adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedContent {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub tags: Vec<String>,
    pub image_prompt: String,
}

impl GeneratedContent {
    /// Build from an extracted JSON object, tolerating missing or mistyped
    /// fields. Returns `None` when the object carries no article body.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| -> String {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let content = text("content");
        if content.is_empty() {
            return None;
        }

        let tags = match obj.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split([',', '，', '、'])
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let image_prompt = match text("imagePrompt") {
            p if p.is_empty() => text("image_prompt"),
            p => p,
        };

        Some(Self {
            title: text("title"),
            excerpt: text("excerpt"),
            content,
            tags,
            image_prompt,
        })
    }
}
