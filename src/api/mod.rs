//! HTTP API handlers

use axum::http::header::{AsHeaderName, COOKIE, ORIGIN, REFERER, USER_AGENT};
use axum::http::HeaderMap;

use crate::config::AppConfig;
use crate::error::AppError;

pub mod admin;
pub mod generate;
pub mod seo;

/// User agents of scripted clients; the generation endpoint is browser-only
const BLOCKED_AGENTS: [&str; 11] = [
    "curl",
    "wget",
    "python-requests",
    "python-urllib",
    "go-http-client",
    "okhttp",
    "scrapy",
    "postman",
    "bot",
    "spider",
    "crawler",
];

// ============ Request identity ============

/// Admin key from the `X-Auth-Key` header or the `auth-key` cookie
pub fn get_auth_key_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_key) = headers.get("X-Auth-Key") {
        if let Ok(key) = auth_key.to_str() {
            return Some(key.to_string());
        }
    }

    if let Some(cookie) = headers.get(COOKIE) {
        if let Ok(cookie_str) = cookie.to_str() {
            for part in cookie_str.split(';') {
                let part = part.trim();
                if let Some((name, value)) = part.split_once('=') {
                    if name.trim() == "auth-key" {
                        return Some(value.trim().to_string());
                    }
                }
            }
        }
    }

    None
}

fn header_str(headers: &HeaderMap, name: impl AsHeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Rate-limit key: forwarded client IP plus a user-agent prefix
pub fn client_identifier(headers: &HeaderMap) -> String {
    let ip = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str(headers, "x-real-ip"))
        .unwrap_or("unknown");
    let agent: String = header_str(headers, USER_AGENT)
        .unwrap_or("unknown")
        .chars()
        .take(50)
        .collect();
    format!("{}:{}", ip, agent)
}

// ============ Guards ============

/// Reject scripted clients and, when an allow-list is configured, foreign origins
pub fn check_browser_client(headers: &HeaderMap, config: &AppConfig) -> Result<(), AppError> {
    let agent = header_str(headers, USER_AGENT)
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::Forbidden("访问被拒绝".to_string()))?;
    if BLOCKED_AGENTS.iter().any(|b| agent.contains(b)) {
        tracing::warn!("Rejected automated client: {}", agent);
        return Err(AppError::Forbidden("访问被拒绝".to_string()));
    }

    if config.allowed_origins.is_empty() {
        return Ok(());
    }

    let origin = header_str(headers, ORIGIN).map(|o| o.trim_end_matches('/'));
    let referer = header_str(headers, REFERER);
    let allowed = config.allowed_origins.iter().any(|allowed| {
        origin == Some(allowed.as_str())
            || referer
                .map(|r| r == allowed.as_str() || r.starts_with(&format!("{}/", allowed)))
                .unwrap_or(false)
    });
    if !allowed {
        tracing::warn!("Rejected origin {:?} / referer {:?}", origin, referer);
        return Err(AppError::Forbidden("来源不被允许".to_string()));
    }
    Ok(())
}

/// Shared-secret check for admin routes; open when no key is configured
pub fn require_admin(headers: &HeaderMap, config: &AppConfig) -> Result<(), AppError> {
    let Some(expected) = config.admin_api_key.as_deref() else {
        return Ok(());
    };
    match get_auth_key_from_headers(headers) {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AppError::Unauthorized("认证失败".to_string())),
        None => Err(AppError::Unauthorized("缺少认证令牌".to_string())),
    }
}
