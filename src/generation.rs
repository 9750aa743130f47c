//! Generation orchestrator
//!
//! Walks the configured providers in priority order and returns the first
//! usable article. What happens when all of them fail depends on the entry
//! point, see [`FallbackPolicy`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::llm::template::TemplateProvider;
use crate::llm::{ProviderOutcome, TextProvider};
use crate::model::{
    truncate_chars, GeneratedContent, InvalidResource, Resource, ResourceDescription,
    MAX_TITLE_CHARS,
};
use crate::prompts::CONTENT_STANDARDS;

lazy_static! {
    static ref MARKDOWN_NOISE: Regex = Regex::new(r"(?m)^\s*(#{1,6}\s*|[-*]\s+)|[*_`>]|\{\{poster\}\}").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Behavior once every LLM provider has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Script and CLI entry points: fall back to the deterministic template
    Template,
    /// Web API: surface "AI service unavailable"
    Error,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(Self::Template),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown fallback policy: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    InvalidResource(#[from] InvalidResource),

    #[error("AI服务暂时不可用: {0}")]
    AllProvidersFailed(String),
}

/// Winning result of one orchestration run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub content: GeneratedContent,
    pub provider: &'static str,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct Orchestrator {
    providers: Vec<Arc<dyn TextProvider>>,
    template: TemplateProvider,
    policy: FallbackPolicy,
}

impl Orchestrator {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>, policy: FallbackPolicy) -> Self {
        Self {
            providers,
            template: TemplateProvider,
            policy,
        }
    }

    /// Same provider chain with a different all-failed policy
    pub fn with_policy(&self, policy: FallbackPolicy) -> Self {
        Self {
            policy,
            ..self.clone()
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Sanitize `description` and run the provider chain
    pub async fn orchestrate(
        &self,
        description: &ResourceDescription,
    ) -> Result<Generation, GenerationError> {
        let resource = description.sanitize()?;
        self.run(&resource).await
    }

    pub async fn run(&self, resource: &Resource) -> Result<Generation, GenerationError> {
        let started = Instant::now();
        let mut failures = Vec::new();

        for provider in &self.providers {
            tracing::info!("Generating \"{}\" with {}", resource.title, provider.name());
            match provider.generate(resource).await {
                ProviderOutcome::Success(content) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        "Content generated by {} in {}ms",
                        provider.name(),
                        elapsed_ms
                    );
                    return Ok(Generation {
                        content: normalize(content, resource),
                        provider: provider.name(),
                        elapsed_ms,
                    });
                }
                ProviderOutcome::NoResult => {
                    tracing::warn!("{} produced no usable content", provider.name());
                    failures.push(format!("{}: no usable JSON", provider.name()));
                }
                ProviderOutcome::TransportError(detail) => {
                    tracing::warn!("{} failed: {}", provider.name(), detail);
                    failures.push(format!("{}: {}", provider.name(), detail));
                }
            }
        }

        let summary = if failures.is_empty() {
            "no AI provider configured".to_string()
        } else {
            failures.join("; ")
        };

        match self.policy {
            FallbackPolicy::Template => {
                tracing::info!("All AI providers failed ({}), using template", summary);
                let content = self.template.render(resource);
                Ok(Generation {
                    content: normalize(content, resource),
                    provider: TemplateProvider::NAME,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
            FallbackPolicy::Error => {
                tracing::error!("All AI providers failed: {}", summary);
                Err(GenerationError::AllProvidersFailed(summary))
            }
        }
    }
}

/// Fill every field of a provider result so nothing downstream sees blanks
pub fn normalize(mut content: GeneratedContent, resource: &Resource) -> GeneratedContent {
    content.title = content.title.trim().to_string();
    if content.title.is_empty() {
        content.title = resource.title.clone();
    }
    content.title = truncate_chars(&content.title, MAX_TITLE_CHARS);

    content.content = content.content.trim().to_string();
    if content.content.is_empty() {
        content.content = format!("# {}\n\n{}", content.title, resource.description);
    }

    let (_, max_excerpt) = CONTENT_STANDARDS.excerpt_chars;
    let excerpt = content.excerpt.trim();
    content.excerpt = if excerpt.is_empty() {
        let plain = MARKDOWN_NOISE.replace_all(&content.content, " ");
        let plain = WHITESPACE_RUN.replace_all(plain.trim(), " ");
        truncate_chars(&plain, max_excerpt)
    } else {
        truncate_chars(excerpt, max_excerpt)
    };
    if content.excerpt.is_empty() {
        content.excerpt = content.title.clone();
    }

    let (_, max_tags) = CONTENT_STANDARDS.tags_count;
    let mut tags: Vec<String> = Vec::new();
    for tag in content.tags.iter().chain(resource.tags.iter()) {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.is_empty() {
        tags = vec!["资源".to_string(), "分享".to_string()];
    }
    tags.truncate(max_tags);
    content.tags = tags;

    content.image_prompt = content.image_prompt.trim().to_string();
    if content.image_prompt.is_empty() {
        content.image_prompt = format!("{} themed abstract art", resource.category);
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::cohere::CohereProvider;
    use crate::llm::gemini::GeminiProvider;
    use crate::llm::template::DISCLAIMER_HEADING;
    use crate::prompts::PromptStyle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        outcome: ProviderOutcome,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, outcome: ProviderOutcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextProvider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn generate(&self, _resource: &Resource) -> ProviderOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn article(content: &str) -> GeneratedContent {
        GeneratedContent {
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn movie_request() -> ResourceDescription {
        ResourceDescription {
            title: "科幻电影资源分享".to_string(),
            category: Some("电影".to_string()),
            tags: vec!["科幻".to_string(), "经典".to_string()],
            description: None,
            download_link: Some("https://pan.example.com/s/abc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_success_wins_and_later_providers_are_skipped() {
        let first = Scripted::new("first", ProviderOutcome::NoResult);
        let second = Scripted::new("second", ProviderOutcome::Success(article("# 正文")));
        let third = Scripted::new("third", ProviderOutcome::Success(article("unused")));

        let orchestrator = Orchestrator::new(
            vec![first.clone(), second.clone(), third.clone()],
            FallbackPolicy::Error,
        );
        let generation = orchestrator.orchestrate(&movie_request()).await.unwrap();

        assert_eq!(generation.provider, "second");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_result_fields_are_always_populated() {
        let provider = Scripted::new("only", ProviderOutcome::Success(article("## 小节\n\n- 要点一")));
        let orchestrator = Orchestrator::new(vec![provider], FallbackPolicy::Error);
        let content = orchestrator
            .orchestrate(&movie_request())
            .await
            .unwrap()
            .content;

        assert_eq!(content.title, "科幻电影资源分享");
        assert_eq!(content.excerpt, "小节 要点一");
        assert_eq!(content.tags, vec!["科幻", "经典"]);
        assert_eq!(content.image_prompt, "电影 themed abstract art");
    }

    #[tokio::test]
    async fn test_error_policy_surfaces_failure() {
        let orchestrator = Orchestrator::new(
            vec![
                Scripted::new("a", ProviderOutcome::TransportError("502".to_string())),
                Scripted::new("b", ProviderOutcome::NoResult),
            ],
            FallbackPolicy::Error,
        );
        let err = orchestrator.orchestrate(&movie_request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::AllProvidersFailed(ref s) if s.contains("a: 502")));
    }

    #[tokio::test]
    async fn test_invalid_resource_short_circuits() {
        let provider = Scripted::new("never", ProviderOutcome::NoResult);
        let orchestrator = Orchestrator::new(vec![provider.clone()], FallbackPolicy::Template);
        let err = orchestrator
            .orchestrate(&ResourceDescription::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResource(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_providers_fall_back_to_movie_template() {
        let providers: Vec<Arc<dyn TextProvider>> = vec![
            Arc::new(
                GeminiProvider::new("key", PromptStyle::Enhanced)
                    .with_base_url("http://127.0.0.1:1"),
            ),
            Arc::new(
                CohereProvider::new("key", PromptStyle::Enhanced)
                    .with_base_url("http://127.0.0.1:1"),
            ),
        ];
        let orchestrator = Orchestrator::new(providers, FallbackPolicy::Template);
        let generation = orchestrator.orchestrate(&movie_request()).await.unwrap();

        assert_eq!(generation.provider, "template");
        assert!(generation.content.content.contains(DISCLAIMER_HEADING));
        assert!(generation.content.content.contains("🎬"));
        assert!(!generation.content.title.is_empty());

        let strict = orchestrator.with_policy(FallbackPolicy::Error);
        assert!(strict.orchestrate(&movie_request()).await.is_err());
    }

    #[test]
    fn test_normalize_caps_tags_and_excerpt() {
        let resource = movie_request().sanitize().unwrap();
        let mut content = article(&"字".repeat(300));
        content.tags = (0..12).map(|i| format!("t{}", i)).collect();
        let content = normalize(content, &resource);
        assert_eq!(content.tags.len(), 8);
        assert_eq!(content.excerpt.chars().count(), 100);
    }
}
