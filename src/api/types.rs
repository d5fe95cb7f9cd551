use serde::{Deserialize, Serialize};

/// `POST /quiz` 请求体
///
/// 字段都是可选的，缺失时由 handler 返回 400 而不是反序列化错误
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuizRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// `GET /health` 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
