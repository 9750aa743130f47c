//! Sanity HTTP API client
//!
//! GROQ queries over GET, mutations as one-entry transactions, image assets
//! as raw uploads. All authenticated with a bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::{
    Category, ContentStore, DeleteMutation, Mutation, PatchMutation, PatchOperations, PostFilter,
    PostStats, PostSummary, StoreError,
};

pub const DEFAULT_API_VERSION: &str = "2024-01-01";

const POST_PROJECTION: &str =
    r#"{_id, title, "slug": slug.current, excerpt, publishedAt, deletedAt}"#;

#[derive(Debug, Clone)]
pub struct SanityConfig {
    pub project_id: String,
    pub dataset: String,
    pub token: String,
    pub api_version: String,
}

impl SanityConfig {
    fn base_url(&self) -> String {
        format!(
            "https://{}.api.sanity.io/v{}",
            self.project_id, self.api_version
        )
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
struct MutateResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    document: AssetDocument,
}

#[derive(Debug, Deserialize)]
struct AssetDocument {
    #[serde(rename = "_id")]
    id: String,
}

pub struct SanityStore {
    client: reqwest::Client,
    config: SanityConfig,
    base_url: String,
}

impl SanityStore {
    pub fn new(config: SanityConfig) -> Self {
        let base_url = config.base_url();
        Self {
            client: reqwest::Client::new(),
            config,
            base_url,
        }
    }

    /// Point the client at a different host (local proxy or test server)
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run a GROQ query. `params` values are JSON-encoded as `$name` query args.
    pub async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<T, StoreError> {
        let mut url = format!(
            "{}/data/query/{}?query={}",
            self.base_url,
            self.config.dataset,
            urlencoding::encode(query)
        );
        for (name, value) in params {
            url.push_str(&format!(
                "&${}={}",
                name,
                urlencoding::encode(&value.to_string())
            ));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: QueryResponse<T> = response.json().await?;
        Ok(data.result)
    }

    async fn mutate(&self, mutation: Mutation) -> Result<Vec<String>, StoreError> {
        let url = format!(
            "{}/data/mutate/{}?returnIds=true",
            self.base_url, self.config.dataset
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "mutations": [mutation] }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict(body));
        }
        let response = check_status(response).await?;
        let data: MutateResponse = response.json().await?;
        Ok(data.results.into_iter().map(|r| r.id).collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::error!("Sanity API error {}: {}", status, message);
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(message));
    }
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ContentStore for SanityStore {
    async fn find_category(&self, title: &str) -> Result<Option<Category>, StoreError> {
        self.fetch(
            r#"*[_type == "category" && title == $title][0]{_id, title}"#,
            &[("title", Value::String(title.to_string()))],
        )
        .await
    }

    async fn create(&self, document: Value) -> Result<String, StoreError> {
        let requested = document
            .get("_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let ids = self.mutate(Mutation::Create(document)).await?;
        ids.into_iter()
            .next()
            .or(requested)
            .ok_or_else(|| StoreError::InvalidResponse("create returned no id".to_string()))
    }

    async fn patch(&self, id: &str, operations: PatchOperations) -> Result<(), StoreError> {
        self.mutate(Mutation::Patch(PatchMutation {
            id: id.to_string(),
            operations,
        }))
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::Delete(DeleteMutation { id: id.to_string() }))
            .await?;
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let url = format!(
            "{}/assets/images/{}?filename={}",
            self.base_url,
            self.config.dataset,
            urlencoding::encode(filename)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: AssetResponse = response.json().await?;
        Ok(data.document.id)
    }

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<PostSummary>, StoreError> {
        let query = match filter {
            PostFilter::Active => format!(
                r#"*[_type == "post" && deleted != true] | order(publishedAt desc) {}"#,
                POST_PROJECTION
            ),
            PostFilter::Deleted => format!(
                r#"*[_type == "post" && deleted == true] | order(_updatedAt desc) {}"#,
                POST_PROJECTION
            ),
        };
        self.fetch(&query, &[]).await
    }

    async fn post_stats(&self, since: DateTime<Utc>) -> Result<PostStats, StoreError> {
        let counts: Value = self
            .fetch(
                r#"{
                    "total": count(*[_type == "post" && deleted != true]),
                    "deleted": count(*[_type == "post" && deleted == true]),
                    "recent": count(*[_type == "post" && deleted != true && publishedAt > $since])
                }"#,
                &[("since", Value::String(since.to_rfc3339()))],
            )
            .await?;
        let count = |key: &str| counts.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        Ok(PostStats {
            total: count("total"),
            deleted: count("deleted"),
            recent: count("recent"),
        })
    }
}
