//! HTTP 入口
//!
//! - `GET /` 简单说明页
//! - `GET /health` 存活检查
//! - `POST /quiz` 接收起始 URL，跑完整条链路后返回统计

pub mod error;
pub mod handlers;
pub mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{create_router, AppState};
pub use types::QuizRequest;
