//! Content publisher
//!
//! Turns a generated article into a post document in the content store:
//! link guard, poster line, block conversion, category reference and main
//! image. Cache revalidation afterwards is best effort.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{GeneratedContent, Resource};
use crate::store::{ContentStore, StoreError};

pub mod blocks;
pub mod links;

pub use blocks::markdown_to_blocks;
pub use links::{guard_links, is_known_resource_link};

pub const POSTER_TOKEN: &str = "{{poster}}";

const SLUG_MAX_CHARS: usize = 50;

/// Slugs for the categories the site ships with
const CATEGORY_SLUGS: &[(&str, &str)] = &[
    ("电影", "movies"),
    ("软件", "software"),
    ("教育", "education"),
    ("游戏", "games"),
    ("音乐", "music"),
    ("图书", "books"),
    ("其他", "others"),
];

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9_\s-]").unwrap();
    static ref SLUG_SPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref POSTER_LINE: Regex = Regex::new(r"(?m)^[ \t]*\{\{poster\}\}[ \t]*\n?").unwrap();
}

/// What to do when the resource's category does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryPolicy {
    /// Publish without a category reference
    RequireExisting,
    /// Create it with a deterministic id, re-reading on a concurrent create
    CreateMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPostRef {
    pub id: String,
    pub slug: String,
}

#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ContentStore>,
    http: reqwest::Client,
    category_policy: CategoryPolicy,
    revalidate_url: Option<String>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ContentStore>, category_policy: CategoryPolicy) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            category_policy,
            revalidate_url: None,
        }
    }

    pub fn with_revalidate_url(mut self, url: Option<String>) -> Self {
        self.revalidate_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Create the post document. Store failures propagate; poster upload and
    /// revalidation failures are only logged.
    pub async fn publish(
        &self,
        content: &GeneratedContent,
        resource: &Resource,
        poster_url: Option<&str>,
    ) -> Result<PublishedPostRef, StoreError> {
        let now = Utc::now();
        let slug = post_slug(&content.title, now.timestamp_millis());

        let markdown = insert_poster(&content.content, &content.title, poster_url);
        let markdown = guard_links(&markdown, resource.download_link.as_deref());
        let body = markdown_to_blocks(&markdown);

        let mut post = json!({
            "_type": "post",
            "title": content.title,
            "slug": {"_type": "slug", "current": slug},
            "excerpt": content.excerpt,
            "publishedAt": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "markdownContent": markdown,
            "body": body,
            "tags": content.tags,
        });

        if let Some(category_id) = self.resolve_category(&resource.category).await? {
            post["categories"] = json!([{
                "_type": "reference",
                "_ref": category_id,
                "_key": uuid::Uuid::new_v4().simple().to_string(),
            }]);
        }

        if let Some(link) = resource
            .download_link
            .as_deref()
            .filter(|l| is_known_resource_link(l))
        {
            post["downloadLink"] = json!(link);
        }

        if let Some(url) = poster_url {
            let alt = format!("{} 海报", content.title);
            post["mainImage"] = self.main_image(url, &alt).await;
            post["mainImageUrl"] = json!(url);
        }

        let id = self.store.create(post).await.map_err(|e| {
            tracing::error!("Failed to create post \"{}\": {}", content.title, e);
            e
        })?;
        tracing::info!("Published post {} ({})", id, slug);

        self.revalidate().await;

        Ok(PublishedPostRef { id, slug })
    }

    /// Category id for `name` under the configured policy
    pub async fn resolve_category(&self, name: &str) -> Result<Option<String>, StoreError> {
        if let Some(existing) = self.store.find_category(name).await? {
            return Ok(Some(existing.id));
        }

        match self.category_policy {
            CategoryPolicy::RequireExisting => {
                tracing::warn!("Category \"{}\" does not exist, publishing without it", name);
                Ok(None)
            }
            CategoryPolicy::CreateMissing => {
                let slug = category_slug(name);
                let id = format!("category-{}", slug);
                let document = json!({
                    "_id": id,
                    "_type": "category",
                    "title": name,
                    "slug": {"_type": "slug", "current": slug},
                    "description": format!("{}相关资源分享", name),
                });

                match self.store.create(document).await {
                    Ok(created) => {
                        tracing::info!("Created category \"{}\" ({})", name, created);
                        Ok(Some(created))
                    }
                    Err(StoreError::Conflict(_)) => {
                        tracing::debug!("Category {} created concurrently, re-reading", id);
                        let existing = self.store.find_category(name).await?;
                        Ok(Some(existing.map(|c| c.id).unwrap_or(id)))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Uploaded asset reference, or the raw URL when the upload fails
    async fn main_image(&self, url: &str, alt: &str) -> Value {
        match self.upload_poster(url).await {
            Ok(asset_id) => json!({
                "_type": "image",
                "asset": {"_type": "reference", "_ref": asset_id},
                "alt": alt,
                "customUrl": url,
            }),
            Err(e) => {
                tracing::warn!("Poster upload failed, keeping remote URL: {}", e);
                json!({
                    "_type": "image",
                    "customUrl": url,
                    "alt": alt,
                })
            }
        }
    }

    async fn upload_poster(&self, url: &str) -> anyhow::Result<String> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("poster download returned {}", response.status());
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        let filename = format!("poster-{}.jpg", Utc::now().timestamp_millis());
        Ok(self
            .store
            .upload_image(bytes, &filename, &content_type)
            .await?)
    }

    async fn revalidate(&self) {
        let Some(url) = &self.revalidate_url else {
            return;
        };
        match self.http.post(url).send().await {
            Ok(r) if r.status().is_success() => tracing::debug!("Revalidation triggered"),
            Ok(r) => tracing::warn!("Revalidation returned {}", r.status()),
            Err(e) => tracing::warn!("Revalidation failed: {}", e),
        }
    }
}

/// ASCII slug of `title` plus a millisecond timestamp
pub fn post_slug(title: &str, millis: i64) -> String {
    let base = ascii_slug(title);
    let base: String = base.chars().take(SLUG_MAX_CHARS).collect();
    let base = base.trim_matches('-');
    if base.is_empty() {
        format!("post-{}", millis)
    } else {
        format!("{}-{}", base, millis)
    }
}

pub fn category_slug(name: &str) -> String {
    if let Some((_, slug)) = CATEGORY_SLUGS.iter().find(|(n, _)| *n == name) {
        return slug.to_string();
    }
    let slug = ascii_slug(name);
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        let digest = format!("{:x}", md5::compute(name.as_bytes()));
        format!("category-{}", &digest[..8])
    } else {
        slug.to_string()
    }
}

fn ascii_slug(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = NON_SLUG.replace_all(&lower, "");
    SLUG_SPACE.replace_all(stripped.trim(), "-").into_owned()
}

/// Replace the poster token with an image line, or drop it
pub fn insert_poster(markdown: &str, title: &str, poster_url: Option<&str>) -> String {
    match poster_url {
        Some(url) => markdown.replace(POSTER_TOKEN, &format!("![{} 海报]({})", title, url)),
        None => POSTER_LINE
            .replace_all(markdown, "")
            .replace(POSTER_TOKEN, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PostFilter};

    fn resource(link: Option<&str>) -> Resource {
        Resource {
            title: "科幻电影资源分享".to_string(),
            category: "电影".to_string(),
            tags: vec!["科幻".to_string()],
            description: String::new(),
            download_link: link.map(str::to_string),
        }
    }

    fn content() -> GeneratedContent {
        GeneratedContent {
            title: "Interstellar 星际穿越".to_string(),
            excerpt: "摘要".to_string(),
            content: "# 星际穿越\n\n{{poster}}\n\n## 获取方式\n\n**下载链接：** [点击获取](#)".to_string(),
            tags: vec!["科幻".to_string()],
            image_prompt: "space".to_string(),
        }
    }

    #[test]
    fn test_post_slug() {
        assert_eq!(post_slug("Interstellar 星际穿越", 1700), "interstellar-1700");
        assert_eq!(post_slug("流浪地球", 1700), "post-1700");
        let long = post_slug(&"a".repeat(80), 1);
        assert_eq!(long, format!("{}-1", "a".repeat(50)));
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug("电影"), "movies");
        assert_eq!(category_slug("Dev Tools"), "dev-tools");
        let hashed = category_slug("纪录片");
        assert!(hashed.starts_with("category-"));
        assert_eq!(hashed, category_slug("纪录片"));
    }

    #[test]
    fn test_insert_poster() {
        let md = "# T\n\n{{poster}}\n\n正文";
        assert_eq!(
            insert_poster(md, "T", Some("https://img/p.jpg")),
            "# T\n\n![T 海报](https://img/p.jpg)\n\n正文"
        );
        assert_eq!(insert_poster(md, "T", None), "# T\n\n\n正文");
    }

    #[tokio::test]
    async fn test_publish_creates_post_with_category_and_guarded_links() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Publisher::new(store.clone(), CategoryPolicy::CreateMissing);

        let published = publisher
            .publish(&content(), &resource(None), None)
            .await
            .unwrap();
        assert!(published.slug.starts_with("interstellar-"));

        let post = store.get(&published.id).unwrap();
        assert_eq!(post["categories"][0]["_ref"], "category-movies");
        let markdown = post["markdownContent"].as_str().unwrap();
        assert!(markdown.contains(links::COMING_SOON));
        assert!(!markdown.contains("{{poster}}"));
        assert!(post.get("mainImage").is_none());
        assert!(post.get("downloadLink").is_none());

        // second publish reuses the category
        publisher.publish(&content(), &resource(None), None).await.unwrap();
        assert_eq!(store.documents_of_type("category").len(), 1);
        assert_eq!(store.list_posts(PostFilter::Active).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_require_existing_publishes_without_category() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Publisher::new(store.clone(), CategoryPolicy::RequireExisting);
        let published = publisher
            .publish(&content(), &resource(Some("https://pan.example.com/s/abc")), None)
            .await
            .unwrap();

        let post = store.get(&published.id).unwrap();
        assert!(post.get("categories").is_none());
        assert!(store.documents_of_type("category").is_empty());
        assert_eq!(post["downloadLink"], "https://pan.example.com/s/abc");
        assert!(post["markdownContent"]
            .as_str()
            .unwrap()
            .contains("](https://pan.example.com/s/abc)"));
    }

    #[tokio::test]
    async fn test_concurrent_category_create_uses_existing() {
        let store = Arc::new(MemoryStore::new());
        // same deterministic id, different title: find misses, create conflicts
        store
            .create(json!({"_id": "category-movies", "_type": "category", "title": "Movies"}))
            .await
            .unwrap();
        let publisher = Publisher::new(store.clone(), CategoryPolicy::CreateMissing);
        let id = publisher.resolve_category("电影").await.unwrap();
        assert_eq!(id.as_deref(), Some("category-movies"));
    }

    #[tokio::test]
    async fn test_failed_poster_upload_keeps_url() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Publisher::new(store.clone(), CategoryPolicy::RequireExisting);
        let poster = "http://127.0.0.1:1/poster.jpg";
        let published = publisher
            .publish(&content(), &resource(None), Some(poster))
            .await
            .unwrap();

        let post = store.get(&published.id).unwrap();
        assert_eq!(post["mainImage"]["customUrl"], poster);
        assert!(post["mainImage"].get("asset").is_none());
        assert_eq!(post["mainImageUrl"], poster);
        assert!(post["markdownContent"]
            .as_str()
            .unwrap()
            .contains("![Interstellar 星际穿越 海报](http://127.0.0.1:1/poster.jpg)"));
        assert_eq!(store.asset_count(), 0);
    }

    async fn serve_poster() -> String {
        let app = axum::Router::new().route(
            "/poster.png",
            axum::routing::get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, "image/png")],
                    vec![0x89u8, b'P', b'N', b'G'],
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/poster.png", addr)
    }

    #[tokio::test]
    async fn test_uploaded_poster_becomes_asset_reference() {
        let poster = serve_poster().await;
        let store = Arc::new(MemoryStore::new());
        let publisher = Publisher::new(store.clone(), CategoryPolicy::RequireExisting);
        let published = publisher
            .publish(&content(), &resource(None), Some(&poster))
            .await
            .unwrap();

        let post = store.get(&published.id).unwrap();
        assert_eq!(post["mainImage"]["asset"]["_type"], "reference");
        assert!(post["mainImage"]["asset"]["_ref"]
            .as_str()
            .unwrap()
            .starts_with("image-"));
        assert_eq!(post["mainImageUrl"], poster.as_str());
        assert_eq!(store.asset_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_upload_falls_back_to_remote_url() {
        let poster = serve_poster().await;
        let store = Arc::new(MemoryStore::new());
        store.fail_uploads(true);
        let publisher = Publisher::new(store.clone(), CategoryPolicy::RequireExisting);
        let published = publisher
            .publish(&content(), &resource(None), Some(&poster))
            .await
            .unwrap();

        let post = store.get(&published.id).unwrap();
        assert!(post["mainImage"].get("asset").is_none());
        assert_eq!(post["mainImage"]["customUrl"], poster.as_str());
        assert_eq!(store.asset_count(), 0);
    }

    #[tokio::test]
    async fn test_revalidation_failure_does_not_fail_publish() {
        let store = Arc::new(MemoryStore::new());
        let publisher = Publisher::new(store.clone(), CategoryPolicy::RequireExisting)
            .with_revalidate_url(Some("http://127.0.0.1:1/api/revalidate".to_string()));

        let published = publisher
            .publish(&content(), &resource(None), None)
            .await
            .unwrap();
        assert!(store.get(&published.id).is_some());
        assert_eq!(store.list_posts(PostFilter::Active).await.unwrap().len(), 1);
    }
}
