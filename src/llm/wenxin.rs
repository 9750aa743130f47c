//! Baidu Wenxin (ERNIE) provider implementation
//!
//! Auth is an OAuth client-credentials exchange. The resulting access token is
//! kept in a `TokenCache` that callers inject, together with the `Clock` used
//! to judge expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{network_error, status_error, ProviderOutcome, TextProvider};
use crate::model::Resource;
use crate::prompts::{self, PromptStyle, WENXIN_PARAMS};

pub const BAIDU_OAUTH_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
pub const WENXIN_CHAT_URL: &str =
    "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions";

/// Tokens are refreshed this long before Baidu says they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Baidu error codes meaning the access token is no longer accepted
const TOKEN_REJECTED_CODES: [i64; 2] = [110, 111];

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedToken>;
    fn put(&self, key: &str, token: CachedToken);
    fn invalidate(&self, key: &str);
}

/// Process-local token cache
#[derive(Default)]
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache for MemoryTokenCache {
    fn get(&self, key: &str) -> Option<CachedToken> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, token: CachedToken) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), token);
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    result: Option<String>,
    error_code: Option<i64>,
    error_msg: Option<String>,
}

pub struct WenxinProvider {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
    oauth_url: String,
    chat_url: String,
    style: PromptStyle,
    cache: Arc<dyn TokenCache>,
    clock: Arc<dyn Clock>,
}

impl WenxinProvider {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        style: PromptStyle,
    ) -> Self {
        Self {
            client: super::build_client(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            oauth_url: BAIDU_OAUTH_URL.to_string(),
            chat_url: WENXIN_CHAT_URL.to_string(),
            style,
            cache: Arc::new(MemoryTokenCache::default()),
            clock: Arc::new(SystemClock),
        }
    }

    #[cfg(test)]
    pub fn with_token_cache(mut self, cache: Arc<dyn TokenCache>, clock: Arc<dyn Clock>) -> Self {
        self.cache = cache;
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, oauth_url: impl Into<String>, chat_url: impl Into<String>) -> Self {
        self.oauth_url = oauth_url.into();
        self.chat_url = chat_url.into();
        self
    }

    /// Return a live token from the cache or exchange credentials for a new one
    pub async fn access_token(&self) -> Result<String, String> {
        let now = self.clock.now();
        if let Some(cached) = self.cache.get(&self.api_key) {
            if cached.expires_at > now {
                return Ok(cached.token);
            }
            tracing::debug!("Cached Wenxin token expired at {}", cached.expires_at);
        }

        let response = self
            .client
            .post(&self.oauth_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.secret_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("Baidu token request failed: {}", e.without_url()))?;

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Baidu token response invalid: {}", e.without_url()))?;

        let token = data.access_token.ok_or_else(|| {
            format!(
                "Failed to get Baidu access token: {}",
                data.error_description.unwrap_or_default()
            )
        })?;

        let lifetime = data.expires_in.unwrap_or(0) - EXPIRY_MARGIN_SECS;
        self.cache.put(
            &self.api_key,
            CachedToken {
                token: token.clone(),
                expires_at: now + Duration::seconds(lifetime.max(0)),
            },
        );

        Ok(token)
    }
}

#[async_trait]
impl TextProvider for WenxinProvider {
    fn name(&self) -> &'static str {
        "wenxin"
    }

    async fn generate(&self, resource: &Resource) -> ProviderOutcome {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("{}", e);
                return ProviderOutcome::TransportError(e);
            }
        };

        let prompt = prompts::render(self.style, resource);
        let response = match self
            .client
            .post(&self.chat_url)
            .query(&[("access_token", token.as_str())])
            .json(&serde_json::json!({
                "messages": [{"role": "user", "content": prompt}],
                "temperature": WENXIN_PARAMS.temperature,
                "top_p": WENXIN_PARAMS.top_p,
                "penalty_score": WENXIN_PARAMS.penalty_score,
                "max_output_tokens": WENXIN_PARAMS.max_output_tokens
            }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return network_error("Wenxin", e),
        };

        if !response.status().is_success() {
            return status_error("Wenxin", response).await;
        }

        let data: ChatResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => return network_error("Wenxin", e),
        };

        if let Some(code) = data.error_code {
            if TOKEN_REJECTED_CODES.contains(&code) {
                self.cache.invalidate(&self.api_key);
            }
            let msg = data.error_msg.unwrap_or_default();
            tracing::warn!("Wenxin API error {}: {}", code, msg);
            return ProviderOutcome::TransportError(format!("Wenxin API error {}: {}", code, msg));
        }

        match data.result {
            Some(text) => ProviderOutcome::from_model_text(&text),
            None => ProviderOutcome::NoResult,
        }
    }
}
