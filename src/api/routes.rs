//! 路由与共享状态

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::Config;
use crate::orchestrator::ChainOrchestrator;

/// 所有请求共享的只读状态
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<ChainOrchestrator>,
}

/// 构建路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/quiz", post(handlers::handle_quiz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
