//! OMDb title lookup

use async_trait::async_trait;
use serde::Deserialize;

use super::{PosterSource, SearchVariant};

pub const OMDB_API_BASE: &str = "http://www.omdbapi.com/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    poster: Option<String>,
    title: Option<String>,
    error: Option<String>,
}

impl OmdbResponse {
    fn poster(self) -> Option<String> {
        if self.response != "True" {
            return None;
        }
        self.poster.filter(|p| !p.is_empty() && p != "N/A")
    }
}

pub struct OmdbSource {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OmdbSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OMDB_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PosterSource for OmdbSource {
    fn name(&self) -> &'static str {
        "omdb"
    }

    /// Exact-title lookup with the primary variant only
    async fn lookup(&self, variants: &[SearchVariant]) -> Option<String> {
        let api_key = self.api_key.as_deref()?;
        let primary = variants.first()?;

        let mut query = vec![("t", primary.query.as_str()), ("apikey", api_key)];
        if let Some(year) = &primary.year {
            query.push(("y", year.as_str()));
        }

        let response = self.client.get(&self.base_url).query(&query).send().await.ok()?;
        if !response.status().is_success() {
            tracing::debug!("OMDb returned {}", response.status());
            return None;
        }
        let data: OmdbResponse = response.json().await.ok()?;
        if data.response != "True" {
            tracing::debug!("OMDb miss: {}", data.error.as_deref().unwrap_or("unknown"));
        } else {
            tracing::debug!("OMDb matched {}", data.title.as_deref().unwrap_or_default());
        }
        data.poster()
    }
}
