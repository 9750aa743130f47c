//! Baidu active URL submission

use serde_json::Value;

use crate::store::PostSummary;

pub const BAIDU_PUSH_ENDPOINT: &str = "http://data.zz.baidu.com/urls";

/// Baidu accepts this many pushed URLs per site per day
pub const DAILY_QUOTA: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SeoError {
    #[error("未配置百度推送Token")]
    NotConfigured,

    #[error("请提供要推送的URL列表")]
    NoUrls,

    #[error("Baidu push request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Baidu push rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone)]
pub struct BaiduPushClient {
    http: reqwest::Client,
    site: String,
    token: Option<String>,
    endpoint: String,
}

impl BaiduPushClient {
    pub fn new(site: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            site: site.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            endpoint: BAIDU_PUSH_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Submit `urls` as one newline-separated text body. Returns Baidu's JSON
    /// reply (`success`, `remain`, `not_same_site`, ...).
    pub async fn push(&self, urls: &[String]) -> Result<Value, SeoError> {
        let token = self.token.as_deref().ok_or(SeoError::NotConfigured)?;
        if urls.is_empty() {
            return Err(SeoError::NoUrls);
        }

        tracing::info!("Pushing {} URL(s) to Baidu", urls.len());

        // the token travels in the query string, keep it out of error text
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("site", self.site.as_str()), ("token", token)])
            .header("Content-Type", "text/plain")
            .body(urls.join("\n"))
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        if !status.is_success() {
            tracing::warn!("Baidu push rejected {}: {}", status, body);
            return Err(SeoError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let result: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        tracing::info!("Baidu push result: {}", result);
        Ok(result)
    }

    /// Public URLs of the newest `limit` posts
    pub fn post_urls(&self, posts: &[PostSummary], limit: usize) -> Vec<String> {
        posts
            .iter()
            .filter_map(|p| p.slug.as_deref())
            .filter(|s| !s.is_empty())
            .take(limit)
            .map(|slug| format!("{}/posts/{}", self.site, slug))
            .collect()
    }
}
