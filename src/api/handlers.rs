//! HTTP handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    Json,
};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use url::Url;

use super::error::ApiError;
use super::routes::AppState;
use super::types::{HealthResponse, QuizRequest};
use crate::error::QuizError;
use crate::models::{ChainOutcome, QuizTask};

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Quiz Chain Solver</title></head>
<body>
<h1>Quiz Chain Solver</h1>
<ul>
  <li><code>GET /health</code> - health check</li>
  <li><code>POST /quiz</code> - body <code>{"email": "...", "secret": "...", "url": "https://..."}</code></li>
</ul>
<p>The response is sent when the quiz chain finishes or its time budget runs out.</p>
</body>
</html>
"#;

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// 接收答题请求，跑完整条链路后返回统计
pub async fn handle_quiz(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Json<ChainOutcome>, ApiError> {
    let Json(body) = payload.map_err(|e| {
        warn!("请求体不是合法 JSON: {}", e);
        ApiError::BadRequest("Invalid JSON".to_string())
    })?;

    let request: QuizRequest = serde_json::from_value(body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON".to_string()))?;

    let (email, secret, url) = match (
        non_empty(request.email),
        non_empty(request.secret),
        non_empty(request.url),
    ) {
        (Some(email), Some(secret), Some(url)) => (email, secret, url),
        _ => {
            warn!("请求缺少必填字段");
            return Err(ApiError::BadRequest(
                "Missing required fields: email, secret, url".to_string(),
            ));
        }
    };

    // 先校验 secret，再做任何链路工作
    if !constant_time_eq(&secret, &state.config.secret) {
        warn!("secret 校验失败: {}", email);
        return Err(QuizError::Authentication.into());
    }

    let start_url = Url::parse(&url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid url: {}", url)))?;

    info!("收到答题请求: {} ({})", start_url, email);

    let task = QuizTask::new(email, secret, start_url, state.config.chain_budget);
    let outcome = state.orchestrator.run(&task).await;

    Ok(Json(outcome))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}
