//! Error types for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::generation::GenerationError;
use crate::model::InvalidResource;
use crate::rate_limit::RateLimitExceeded;
use crate::seo::SeoError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("请求过于频繁，请在 {retry_after_secs} 秒后重试")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),
}

impl From<InvalidResource> for AppError {
    fn from(e: InvalidResource) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::InvalidResource(e) => e.into(),
            GenerationError::AllProvidersFailed(_) => {
                AppError::ServiceUnavailable("AI service unavailable".to_string())
            }
        }
    }
}

impl From<SeoError> for AppError {
    fn from(e: SeoError) -> Self {
        match e {
            SeoError::NotConfigured => AppError::Internal(e.to_string()),
            SeoError::NoUrls => AppError::BadRequest(e.to_string()),
            SeoError::Request(e) => AppError::Request(e),
            SeoError::Rejected { .. } => AppError::BadGateway(e.to_string()),
        }
    }
}

impl From<RateLimitExceeded> for AppError {
    fn from(e: RateLimitExceeded) -> Self {
        AppError::RateLimited {
            retry_after_secs: e.retry_after.as_secs().max(1),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Request(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Anyhow(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        let mut response = (status, body).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
