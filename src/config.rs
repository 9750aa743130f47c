//! Application configuration loaded from environment variables

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;

use crate::generation::FallbackPolicy;
use crate::llm::cohere::CohereProvider;
use crate::llm::gemini::GeminiProvider;
use crate::llm::wenxin::WenxinProvider;
use crate::llm::TextProvider;
use crate::media::douban::DoubanSource;
use crate::media::omdb::OmdbSource;
use crate::media::tmdb::TmdbSource;
use crate::media::unsplash::UnsplashSource;
use crate::media::{MediaResolver, PosterSource};
use crate::prompts::PromptStyle;
use crate::store::sanity::DEFAULT_API_VERSION;
use crate::store::SanityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Cohere,
    Wenxin,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "cohere" => Ok(Self::Cohere),
            "wenxin" | "baidu" => Ok(Self::Wenxin),
            other => Err(format!("unknown AI provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub cohere_api_key: Option<String>,
    pub baidu_api_key: Option<String>,
    pub baidu_secret_key: Option<String>,
    /// Provider priority, first entry tried first
    pub ai_providers: Vec<ProviderKind>,
    pub prompt_style: PromptStyle,
    /// All-providers-failed behavior of the web API
    pub api_fallback: FallbackPolicy,

    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub unsplash_access_key: Option<String>,

    pub sanity: Option<SanityConfig>,
    pub revalidate_url: Option<String>,

    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    /// Browser origins allowed to call the generation endpoint; empty allows all
    pub allowed_origins: Vec<String>,
    pub admin_api_key: Option<String>,

    pub baidu_push_token: Option<String>,
    pub site_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let ai_providers = get("AI_PROVIDERS")
            .unwrap_or_else(|| "gemini,cohere,wenxin".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| match s.parse::<ProviderKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!("Ignoring AI_PROVIDERS entry: {}", e);
                    None
                }
            })
            .collect();

        let sanity = match (get("SANITY_PROJECT_ID"), get("SANITY_API_TOKEN")) {
            (Some(project_id), Some(token)) => Some(SanityConfig {
                project_id,
                dataset: get("SANITY_DATASET").unwrap_or_else(|| "production".to_string()),
                token,
                api_version: get("SANITY_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("PORT must be a valid u16")?,

            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL"),
            cohere_api_key: get("COHERE_API_KEY"),
            baidu_api_key: get("BAIDU_API_KEY"),
            baidu_secret_key: get("BAIDU_SECRET_KEY"),
            ai_providers,
            prompt_style: match get("PROMPT_STYLE") {
                Some(s) => s.parse().map_err(anyhow::Error::msg)?,
                None => PromptStyle::default(),
            },
            api_fallback: match get("API_ON_ALL_PROVIDERS_FAILED") {
                Some(s) => s.parse().map_err(anyhow::Error::msg)?,
                None => FallbackPolicy::Error,
            },

            tmdb_api_key: get("TMDB_API_KEY"),
            omdb_api_key: get("OMDB_API_KEY"),
            unsplash_access_key: get("UNSPLASH_ACCESS_KEY"),

            sanity,
            revalidate_url: get("REVALIDATE_URL"),

            rate_limit_max: get("RATE_LIMIT_MAX")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("RATE_LIMIT_MAX must be a valid u32")?,
            rate_limit_window_secs: get("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .context("RATE_LIMIT_WINDOW_SECS must be a valid u64")?,
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            admin_api_key: get("ADMIN_API_KEY"),

            baidu_push_token: get("BAIDU_PUSH_TOKEN"),
            site_url: get("SITE_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// LLM adapters in priority order; providers without credentials are skipped
    pub fn text_providers(&self) -> Vec<Arc<dyn TextProvider>> {
        let mut providers: Vec<Arc<dyn TextProvider>> = Vec::new();
        for kind in &self.ai_providers {
            match kind {
                ProviderKind::Gemini => {
                    if let Some(key) = &self.gemini_api_key {
                        let mut gemini = GeminiProvider::new(key.clone(), self.prompt_style);
                        if let Some(model) = &self.gemini_model {
                            gemini = gemini.with_model(model.clone());
                        }
                        providers.push(Arc::new(gemini));
                    }
                }
                ProviderKind::Cohere => {
                    if let Some(key) = &self.cohere_api_key {
                        providers.push(Arc::new(CohereProvider::new(key.clone(), self.prompt_style)));
                    }
                }
                ProviderKind::Wenxin => {
                    if let (Some(key), Some(secret)) = (&self.baidu_api_key, &self.baidu_secret_key) {
                        providers.push(Arc::new(WenxinProvider::new(
                            key.clone(),
                            secret.clone(),
                            self.prompt_style,
                        )));
                    }
                }
            }
        }
        providers
    }

    /// TMDB, OMDb, Douban, Unsplash in that order
    pub fn media_resolver(&self) -> MediaResolver {
        let sources: Vec<Arc<dyn PosterSource>> = vec![
            Arc::new(TmdbSource::new(self.tmdb_api_key.clone())),
            Arc::new(OmdbSource::new(self.omdb_api_key.clone())),
            Arc::new(DoubanSource::new()),
            Arc::new(UnsplashSource::new(self.unsplash_access_key.clone())),
        ];
        MediaResolver::new(sources)
    }
}
