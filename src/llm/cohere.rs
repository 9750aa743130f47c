//! Cohere generate API provider
//! Bearer-token auth; the completion is a single free-form `text` field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{network_error, status_error, ProviderOutcome, TextProvider};
use crate::model::Resource;
use crate::prompts::{self, PromptStyle, COHERE_PARAMS};

pub const COHERE_API_BASE: &str = "https://api.cohere.ai/v1";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    text: Option<String>,
}

pub struct CohereProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    style: PromptStyle,
}

impl CohereProvider {
    pub fn new(api_key: impl Into<String>, style: PromptStyle) -> Self {
        Self {
            client: super::build_client(),
            api_key: api_key.into(),
            base_url: COHERE_API_BASE.to_string(),
            style,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextProvider for CohereProvider {
    fn name(&self) -> &'static str {
        "cohere"
    }

    async fn generate(&self, resource: &Resource) -> ProviderOutcome {
        let prompt = prompts::render(self.style, resource);
        let url = format!("{}/generate", self.base_url.trim_end_matches('/'));

        let request = GenerateRequest {
            model: COHERE_PARAMS.model,
            prompt: &prompt,
            max_tokens: COHERE_PARAMS.max_tokens,
            temperature: COHERE_PARAMS.temperature,
            presence_penalty: COHERE_PARAMS.presence_penalty,
            frequency_penalty: COHERE_PARAMS.frequency_penalty,
        };

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return network_error("Cohere", e),
        };

        if !response.status().is_success() {
            return status_error("Cohere", response).await;
        }

        let data: GenerateResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => return network_error("Cohere", e),
        };

        let text = data
            .generations
            .into_iter()
            .next()
            .and_then(|g| g.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            tracing::warn!("No response content from Cohere");
            return ProviderOutcome::NoResult;
        }

        ProviderOutcome::from_model_text(&text)
    }
}
