//! Gemini LLM provider implementation

use async_trait::async_trait;
use serde_json::Value;

use super::{network_error, status_error, ProviderOutcome, TextProvider};
use crate::model::Resource;
use crate::prompts::{self, PromptStyle, GEMINI_PARAMS};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini generateContent adapter; the API key travels in the query string
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    style: PromptStyle,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, style: PromptStyle) -> Self {
        Self {
            client: super::build_client(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            style,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": GEMINI_PARAMS.temperature,
                "maxOutputTokens": GEMINI_PARAMS.max_output_tokens,
                "topP": GEMINI_PARAMS.top_p,
                "topK": GEMINI_PARAMS.top_k
            }
        })
    }
}

/// candidates[0].content.parts[0].text
fn response_text(data: &Value) -> Option<&str> {
    data.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, resource: &Resource) -> ProviderOutcome {
        let prompt = prompts::render(self.style, resource);
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let response = match self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(&prompt))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return network_error("Gemini", e),
        };

        if !response.status().is_success() {
            return status_error("Gemini", response).await;
        }

        let data: Value = match response.json().await {
            Ok(d) => d,
            Err(e) => return network_error("Gemini", e),
        };

        match response_text(&data) {
            Some(text) => {
                let outcome = ProviderOutcome::from_model_text(text);
                if outcome == ProviderOutcome::NoResult {
                    tracing::warn!("Gemini returned text without a usable JSON object");
                }
                outcome
            }
            None => {
                tracing::warn!("Unexpected Gemini response shape: {}", data);
                ProviderOutcome::NoResult
            }
        }
    }
}
