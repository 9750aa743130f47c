//! Content store access
//!
//! The CMS is treated as an opaque document store. Everything the pipeline and
//! the admin routes need goes through [`ContentStore`], so the HTTP client and
//! the in-memory store used by tests and dry runs are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod memory;
pub mod sanity;

pub use memory::MemoryStore;
pub use sanity::{SanityConfig, SanityStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document already exists: {0}")]
    Conflict(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),
}

/// One entry of a mutation transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    Create(Value),
    Patch(PatchMutation),
    Delete(DeleteMutation),
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchMutation {
    pub id: String,
    #[serde(flatten)]
    pub operations: PatchOperations,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteMutation {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatchOperations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<String>>,
}

impl PatchOperations {
    pub fn set(fields: Value) -> Self {
        Self {
            set: Some(fields),
            unset: None,
        }
    }

    pub fn unset(fields: &[&str]) -> Self {
        Self {
            set: None,
            unset: Some(fields.iter().map(|f| f.to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Posts not in the recycle bin
    Active,
    /// Soft-deleted posts
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl PostSummary {
    /// Project a full post document onto the summary shape
    pub fn from_document(doc: &Value) -> Option<Self> {
        let text = |key: &str| doc.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Some(Self {
            id: text("_id")?,
            title: text("title").unwrap_or_default(),
            slug: doc
                .get("slug")
                .and_then(|s| s.get("current"))
                .and_then(|s| s.as_str())
                .map(str::to_string),
            excerpt: text("excerpt"),
            published_at: text("publishedAt"),
            deleted_at: text("deletedAt"),
        })
    }

    pub fn published_after(&self, since: DateTime<Utc>) -> bool {
        self.published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc) > since)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostStats {
    pub total: usize,
    pub deleted: usize,
    pub recent: usize,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Category with exactly this title, if any
    async fn find_category(&self, title: &str) -> Result<Option<Category>, StoreError>;

    /// Create a document; a caller-chosen `_id` that already exists is a
    /// `StoreError::Conflict`. Returns the document id.
    async fn create(&self, document: Value) -> Result<String, StoreError>;

    async fn patch(&self, id: &str, operations: PatchOperations) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Upload raw image bytes, returning the asset document id
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, StoreError>;

    /// Posts newest first
    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<PostSummary>, StoreError>;

    async fn post_stats(&self, since: DateTime<Utc>) -> Result<PostStats, StoreError> {
        let active = self.list_posts(PostFilter::Active).await?;
        let deleted = self.list_posts(PostFilter::Deleted).await?;
        Ok(PostStats {
            total: active.len(),
            deleted: deleted.len(),
            recent: active.iter().filter(|p| p.published_after(since)).count(),
        })
    }
}
