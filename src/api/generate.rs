//! Content generation endpoint

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::{check_browser_client, client_identifier};
use crate::error::AppError;
use crate::generation::{normalize, Generation};
use crate::model::{GeneratedContent, Resource, ResourceDescription};
use crate::publisher::PublishedPostRef;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub resource: Option<ResourceDescription>,
    /// Return the article without writing it to the store
    #[serde(default)]
    pub generate_only: bool,
    /// Publish `content` as given instead of generating
    #[serde(default)]
    pub publish_pregenerated: bool,
    #[serde(default)]
    pub content: Option<GeneratedContent>,
}

/// POST /api/generate-content
pub async fn generate_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_browser_client(&headers, &state.config)?;
    state
        .rate_limiter
        .check(&client_identifier(&headers), Instant::now())?;

    let Json(request) =
        payload.map_err(|e| AppError::BadRequest(format!("请求格式错误: {}", e.body_text())))?;
    let resource = request
        .resource
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("缺少资源信息".to_string()))?
        .sanitize()?;

    let generation = if request.publish_pregenerated {
        let content = request
            .content
            .ok_or_else(|| AppError::BadRequest("缺少预生成内容".to_string()))?;
        tracing::info!("Publishing pregenerated content for \"{}\"", resource.title);
        Generation {
            content: normalize(content, &resource),
            provider: "pregenerated",
            elapsed_ms: 0,
        }
    } else {
        state.orchestrator.run(&resource).await?
    };

    if request.generate_only && !request.publish_pregenerated {
        return Ok(Json(json!({
            "success": true,
            "content": generation.content,
            "method": "generated",
            "provider": generation.provider,
            "processingTime": generation.elapsed_ms,
        })));
    }

    let published = publish(&state, &generation, &resource).await?;
    Ok(Json(json!({
        "success": true,
        "content": generation.content,
        "published": published,
        "method": "published",
        "provider": generation.provider,
        "processingTime": generation.elapsed_ms,
    })))
}

async fn publish(
    state: &AppState,
    generation: &Generation,
    resource: &Resource,
) -> Result<PublishedPostRef, AppError> {
    let poster = state
        .resolver
        .resolve_poster(&resource.title, &resource.category, &resource.tags)
        .await;
    let post = state
        .publisher
        .publish(&generation.content, resource, poster.as_deref())
        .await?;
    Ok(post)
}

/// GET /api/generate-content
pub async fn generation_status(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let config = &state.config;
    Ok(Json(json!({
        "status": "AI内容生成API正常运行",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "providers": state.orchestrator.provider_names(),
        "posterSources": state.resolver.source_names(),
        "apis": {
            "gemini": config.gemini_api_key.is_some(),
            "cohere": config.cohere_api_key.is_some(),
            "wenxin": config.baidu_api_key.is_some() && config.baidu_secret_key.is_some(),
            "sanity": config.sanity.is_some(),
            "baiduPush": state.baidu.is_configured(),
        },
        "fallback": state.orchestrator.policy(),
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::test_support::{body_json, config, json_request, state};
    use crate::llm::cohere::CohereProvider;
    use crate::llm::gemini::GeminiProvider;
    use crate::llm::TextProvider;
    use crate::prompts::PromptStyle;
    use crate::store::{ContentStore, MemoryStore, PostFilter};

    fn unreachable_providers() -> Vec<Arc<dyn TextProvider>> {
        vec![
            Arc::new(
                GeminiProvider::new("key", PromptStyle::Enhanced)
                    .with_base_url("http://127.0.0.1:1"),
            ),
            Arc::new(
                CohereProvider::new("key", PromptStyle::Enhanced)
                    .with_base_url("http://127.0.0.1:1"),
            ),
        ]
    }

    fn movie_body() -> serde_json::Value {
        json!({
            "resource": {
                "title": "科幻电影资源分享",
                "category": "电影",
                "tags": ["科幻", "经典"],
                "downloadLink": "https://pan.example.com/s/abc"
            }
        })
    }

    #[tokio::test]
    async fn test_all_providers_down_returns_503_and_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(config(&[]), unreachable_providers(), store.clone()));

        let response = app
            .oneshot(json_request("POST", "/api/generate-content", movie_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "AI service unavailable");
        assert!(store.list_posts(PostFilter::Active).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_resource_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(config(&[]), Vec::new(), store));

        let response = app
            .oneshot(json_request("POST", "/api/generate-content", json!({"generateOnly": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "缺少资源信息");
    }

    #[tokio::test]
    async fn test_scripted_client_is_forbidden_before_validation() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(config(&[]), Vec::new(), store));

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/generate-content")
            .header("content-type", "application/json")
            .header("user-agent", "python-requests/2.31")
            .body(axum::body::Body::from("not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_per_client() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(
            config(&[("RATE_LIMIT_MAX", "1")]),
            Vec::new(),
            store,
        ));

        let first = app
            .clone()
            .oneshot(json_request("POST", "/api/generate-content", json!({})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = app
            .oneshot(json_request("POST", "/api/generate-content", json!({})))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn test_pregenerated_content_is_normalized_and_published() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(config(&[]), Vec::new(), store.clone()));

        let mut body = movie_body();
        body["resource"]["category"] = json!("软件");
        body["publishPregenerated"] = json!(true);
        body["content"] = json!({
            "title": "",
            "content": "# 软件合集\n\n一份整理好的常用软件清单，适合新电脑装机时参考使用。"
        });

        let response = app
            .oneshot(json_request("POST", "/api/generate-content", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["method"], "published");
        assert_eq!(body["provider"], "pregenerated");
        assert_eq!(body["content"]["title"], "科幻电影资源分享");
        assert!(!body["content"]["excerpt"].as_str().unwrap().is_empty());

        let posts = store.list_posts(PostFilter::Active).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, body["published"]["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let store = Arc::new(MemoryStore::new());
        let app = crate::build_router(state(
            config(&[("GEMINI_API_KEY", "g")]),
            unreachable_providers(),
            store,
        ));

        let request = axum::http::Request::builder()
            .uri("/api/generate-content")
            .body(axum::body::Body::empty())
            .unwrap();
        let body = body_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(body["apis"]["gemini"], true);
        assert_eq!(body["apis"]["sanity"], false);
        assert_eq!(body["providers"], json!(["gemini", "cohere"]));
        assert_eq!(body["fallback"], "error");
    }
}
