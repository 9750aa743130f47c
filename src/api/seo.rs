//! Search engine URL submission endpoint

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::json;

use crate::api::require_admin;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub urls: Vec<String>,
}

/// POST /api/baidu-push
pub async fn baidu_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PushRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let urls: Vec<String> = req
        .urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    let result = state.baidu.push(&urls).await?;

    Ok(Json(json!({
        "success": true,
        "result": result,
        "pushedUrls": urls,
    })))
}
