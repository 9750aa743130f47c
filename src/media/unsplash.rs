//! Unsplash photo search, last resort for a poster-like image

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use super::{PosterSource, SearchVariant};

pub const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

pub struct UnsplashSource {
    client: reqwest::Client,
    access_key: Option<String>,
    search_url: String,
}

impl UnsplashSource {
    pub fn new(access_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_key,
            search_url: UNSPLASH_SEARCH_URL.to_string(),
        }
    }
}

/// results[0].urls.regular
fn regular_url(data: &Value) -> Option<String> {
    data.get("results")?
        .get(0)?
        .get("urls")?
        .get("regular")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl PosterSource for UnsplashSource {
    fn name(&self) -> &'static str {
        "unsplash"
    }

    async fn lookup(&self, variants: &[SearchVariant]) -> Option<String> {
        let access_key = self.access_key.as_deref()?;
        let primary = variants.first()?;
        let query = format!("{} movie poster", primary.query);
        let url = format!(
            "{}?query={}&per_page=1",
            self.search_url,
            urlencoding::encode(&query)
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Client-ID {}", access_key))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!("Unsplash search returned {}", response.status());
            return None;
        }
        let data: Value = response.json().await.ok()?;
        regular_url(&data)
    }
}
