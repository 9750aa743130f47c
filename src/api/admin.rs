//! Recycle bin and post management endpoints

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::api::require_admin;
use crate::error::AppError;
use crate::store::{PatchOperations, PostFilter};
use crate::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleAction {
    SoftDelete,
    Restore,
    PermanentDelete,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycleRequest {
    pub post_id: String,
    /// Kept as a string so an unknown action is a 400 with our own message
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct ManagementRequest {
    pub action: String,
}

// ============ Recycle bin ============

/// GET /api/recycle-bin
pub async fn list_deleted(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;
    let items = state.publisher.store().list_posts(PostFilter::Deleted).await?;
    Ok(Json(json!({
        "success": true,
        "count": items.len(),
        "items": items,
    })))
}

/// POST /api/recycle-bin
pub async fn recycle_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecycleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let action: RecycleAction = serde_json::from_value(json!(req.action))
        .map_err(|_| AppError::BadRequest("无效的操作".to_string()))?;
    if req.post_id.trim().is_empty() {
        return Err(AppError::BadRequest("缺少文章ID".to_string()));
    }

    let store = state.publisher.store();
    let message = match action {
        RecycleAction::SoftDelete => {
            store
                .patch(
                    &req.post_id,
                    PatchOperations::set(json!({
                        "deleted": true,
                        "deletedAt": Utc::now().to_rfc3339(),
                    })),
                )
                .await?;
            "文章已移动到回收站"
        }
        RecycleAction::Restore => {
            store
                .patch(&req.post_id, PatchOperations::unset(&["deleted", "deletedAt"]))
                .await?;
            "文章已恢复"
        }
        RecycleAction::PermanentDelete => {
            store.delete(&req.post_id).await?;
            "文章已永久删除"
        }
    };

    tracing::info!("Recycle bin {:?} on {}", action, req.post_id);
    Ok(Json(json!({ "success": true, "message": message })))
}

/// DELETE /api/recycle-bin
pub async fn empty_recycle_bin(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let store = state.publisher.store();
    let deleted = store.list_posts(PostFilter::Deleted).await?;
    for post in &deleted {
        store.delete(&post.id).await?;
    }

    tracing::info!("Emptied recycle bin: {} post(s)", deleted.len());
    Ok(Json(json!({
        "success": true,
        "message": format!("已永久删除 {} 篇文章", deleted.len()),
    })))
}

// ============ Post management ============

/// GET /api/posts-management
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;
    let posts = state.publisher.store().list_posts(PostFilter::Active).await?;
    Ok(Json(json!({
        "success": true,
        "count": posts.len(),
        "posts": posts,
    })))
}

/// POST /api/posts-management
pub async fn management_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ManagementRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    match req.action.as_str() {
        "stats" => {
            let since = Utc::now() - Duration::days(7);
            let stats = state.publisher.store().post_stats(since).await?;
            Ok(Json(json!({ "success": true, "stats": stats })))
        }
        _ => Err(AppError::BadRequest("无效的操作".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::test_support::{body_json, config, json_request, state};
    use crate::store::{ContentStore, MemoryStore};

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (id, title) in [("post-a", "第一篇"), ("post-b", "第二篇")] {
            store
                .create(json!({
                    "_id": id,
                    "_type": "post",
                    "title": title,
                    "slug": {"_type": "slug", "current": id},
                    "publishedAt": chrono::Utc::now().to_rfc3339(),
                }))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_soft_delete_restore_and_empty() {
        let store = seeded_store().await;
        let app = crate::build_router(state(config(&[]), Vec::new(), store.clone()));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/recycle-bin",
                json!({"postId": "post-a", "action": "soft_delete"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.get("post-a").unwrap()["deleted"], true);

        let listing = app
            .clone()
            .oneshot(Request::get("/api/recycle-bin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listing = body_json(listing).await;
        assert_eq!(listing["count"], 1);
        assert_eq!(listing["items"][0]["_id"], "post-a");

        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/recycle-bin",
                json!({"postId": "post-a", "action": "restore"}),
            ))
            .await
            .unwrap();
        assert!(store.get("post-a").unwrap().get("deleted").is_none());

        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/recycle-bin",
                json!({"postId": "post-b", "action": "soft_delete"}),
            ))
            .await
            .unwrap();
        let emptied = app
            .oneshot(Request::delete("/api/recycle-bin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(emptied).await["message"], "已永久删除 1 篇文章");
        assert!(store.get("post-b").is_none());
        assert!(store.get("post-a").is_some());
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        let store = seeded_store().await;
        let app = crate::build_router(state(config(&[]), Vec::new(), store));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/recycle-bin",
                json!({"postId": "post-a", "action": "archive"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "无效的操作");
    }

    #[tokio::test]
    async fn test_stats_and_listing() {
        let store = seeded_store().await;
        let app = crate::build_router(state(config(&[]), Vec::new(), store));

        let stats = app
            .clone()
            .oneshot(json_request("POST", "/api/posts-management", json!({"action": "stats"})))
            .await
            .unwrap();
        let stats = body_json(stats).await;
        assert_eq!(stats["stats"], json!({"total": 2, "deleted": 0, "recent": 2}));

        let listing = app
            .oneshot(Request::get("/api/posts-management").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(listing).await["count"], 2);
    }

    #[tokio::test]
    async fn test_admin_key_required_when_configured() {
        let store = seeded_store().await;
        let app = crate::build_router(state(
            config(&[("ADMIN_API_KEY", "secret")]),
            Vec::new(),
            store,
        ));

        let denied = app
            .clone()
            .oneshot(Request::get("/api/posts-management").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::get("/api/posts-management")
                    .header("x-auth-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
