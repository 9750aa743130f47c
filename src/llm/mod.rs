//! Text-generation provider adapters
//! Gemini, Cohere and Baidu Wenxin behind one trait, plus the deterministic
//! template generator used as the last resort in script mode.

use async_trait::async_trait;

use crate::model::{GeneratedContent, Resource};

pub mod cohere;
pub mod extract;
pub mod gemini;
pub mod template;
pub mod wenxin;

/// Outcome of a single adapter attempt.
///
/// `NoResult` and `TransportError` are routine: the orchestrator moves on to
/// the next provider in both cases.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success(GeneratedContent),
    NoResult,
    TransportError(String),
}

impl ProviderOutcome {
    /// Map raw model text to an outcome via JSON extraction
    pub fn from_model_text(text: &str) -> Self {
        match extract::extract_json_object(text).and_then(|v| GeneratedContent::from_json(&v)) {
            Some(content) => Self::Success(content),
            None => Self::NoResult,
        }
    }
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Stable name reported in API responses and logs
    fn name(&self) -> &'static str;

    async fn generate(&self, resource: &Resource) -> ProviderOutcome;
}

/// Shared HTTP client builder for the adapters
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read a non-2xx response into a `TransportError`, logging it on the way.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> ProviderOutcome {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    tracing::warn!("{} API error {}: {}", provider, status, error_text);
    ProviderOutcome::TransportError(format!("{} API error {}", provider, status))
}

/// Transport failure as a `TransportError`. The request URL is dropped since
/// it can carry an API key or access token.
pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> ProviderOutcome {
    let err = err.without_url();
    tracing::warn!("{} request failed: {}", provider, err);
    ProviderOutcome::TransportError(format!("{} request failed: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_model_text() {
        let ok = ProviderOutcome::from_model_text("```json\n{\"content\": \"正文\"}\n```");
        assert!(matches!(ok, ProviderOutcome::Success(c) if c.content == "正文"));

        assert_eq!(
            ProviderOutcome::from_model_text("no json here"),
            ProviderOutcome::NoResult
        );
        assert_eq!(
            ProviderOutcome::from_model_text("{\"title\": \"无正文\"}"),
            ProviderOutcome::NoResult
        );
    }

    #[tokio::test]
    async fn test_network_error_hides_request_url() {
        let err = reqwest::Client::new()
            .post("http://127.0.0.1:1/models/x:generateContent?key=very-secret-key")
            .send()
            .await
            .unwrap_err();
        match network_error("Gemini", err) {
            ProviderOutcome::TransportError(detail) => {
                assert!(detail.starts_with("Gemini request failed"));
                assert!(!detail.contains("very-secret-key"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
