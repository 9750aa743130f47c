//! TMDB movie search

use async_trait::async_trait;
use serde::Deserialize;

use super::{select_best, PosterCandidate, PosterSource, SearchVariant};

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// Chinese metadata first, English as the fallback
const LANGUAGES: [&str; 2] = ["zh-CN", "en-US"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Movie>,
}

#[derive(Debug, Deserialize)]
struct Movie {
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
}

impl From<Movie> for PosterCandidate {
    fn from(movie: Movie) -> Self {
        PosterCandidate {
            title: movie.title,
            original_title: movie.original_title,
            release_year: movie
                .release_date
                .and_then(|d| d.get(..4).map(str::to_string)),
            poster_url: movie
                .poster_path
                .map(|p| format!("{}{}", TMDB_IMAGE_BASE, p)),
        }
    }
}

pub struct TmdbSource {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl TmdbSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: TMDB_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, api_key: &str, query: &str, language: &str) -> Vec<PosterCandidate> {
        let url = format!("{}/search/movie", self.base_url);
        let response = match self
            .client
            .get(&url)
            .query(&[("api_key", api_key), ("query", query), ("language", language)])
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!("TMDB search returned {}", r.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!("TMDB search failed: {}", e.without_url());
                return Vec::new();
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(data) => data.results.into_iter().map(PosterCandidate::from).collect(),
            Err(e) => {
                tracing::debug!("TMDB response invalid: {}", e.without_url());
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl PosterSource for TmdbSource {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn lookup(&self, variants: &[SearchVariant]) -> Option<String> {
        let api_key = self.api_key.as_deref()?;

        for variant in variants {
            for language in LANGUAGES {
                let candidates = self.search(api_key, &variant.query, language).await;
                if let Some(best) = select_best(&candidates, variant) {
                    tracing::debug!(
                        "TMDB matched \"{}\" ({}) to {}",
                        variant.query,
                        language,
                        best.title
                    );
                    return best.poster_url.clone();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_to_candidate() {
        let movie: Movie = serde_json::from_str(
            r#"{"title": "流浪地球", "original_title": "流浪地球", "release_date": "2019-02-05", "poster_path": "/abc.jpg"}"#,
        )
        .unwrap();
        let candidate = PosterCandidate::from(movie);
        assert_eq!(candidate.release_year.as_deref(), Some("2019"));
        assert_eq!(
            candidate.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
    }

    #[test]
    fn test_empty_release_date() {
        let movie: Movie =
            serde_json::from_str(r#"{"title": "x", "release_date": "", "poster_path": null}"#).unwrap();
        let candidate = PosterCandidate::from(movie);
        assert_eq!(candidate.release_year, None);
        assert_eq!(candidate.poster_url, None);
    }

    #[tokio::test]
    async fn test_missing_key_is_a_miss() {
        let source = TmdbSource::new(None);
        let variants = super::super::search_variants("流浪地球");
        assert!(source.lookup(&variants).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_is_a_miss() {
        let source = TmdbSource::new(Some("k".to_string())).with_base_url("http://127.0.0.1:1");
        let variants = super::super::search_variants("流浪地球");
        assert!(source.lookup(&variants).await.is_none());
    }
}
