//! Douban subject suggest
//!
//! Unauthenticated, but rejects requests without a browser User-Agent and a
//! douban Referer.

use async_trait::async_trait;
use reqwest::header::{REFERER, USER_AGENT};
use serde::Deserialize;

use super::{PosterSource, SearchVariant};

pub const DOUBAN_SUGGEST_URL: &str = "https://movie.douban.com/j/subject_suggest";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct Suggestion {
    title: Option<String>,
    img: Option<String>,
}

pub struct DoubanSource {
    client: reqwest::Client,
    suggest_url: String,
}

impl DoubanSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            suggest_url: DOUBAN_SUGGEST_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_suggest_url(mut self, url: impl Into<String>) -> Self {
        self.suggest_url = url.into();
        self
    }
}

impl Default for DoubanSource {
    fn default() -> Self {
        Self::new()
    }
}

fn first_image(suggestions: Vec<Suggestion>) -> Option<String> {
    suggestions
        .into_iter()
        .next()
        .and_then(|s| s.img)
        .filter(|img| !img.is_empty())
}

#[async_trait]
impl PosterSource for DoubanSource {
    fn name(&self) -> &'static str {
        "douban"
    }

    async fn lookup(&self, variants: &[SearchVariant]) -> Option<String> {
        let primary = variants.first()?;
        let url = format!(
            "{}?q={}",
            self.suggest_url,
            urlencoding::encode(&primary.query)
        );

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(REFERER, "https://movie.douban.com/")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!("Douban suggest returned {}", response.status());
            return None;
        }

        let suggestions: Vec<Suggestion> = response.json().await.ok()?;
        if let Some(first) = suggestions.first() {
            tracing::debug!("Douban suggested {}", first.title.as_deref().unwrap_or_default());
        }
        first_image(suggestions)
    }
}
