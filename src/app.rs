//! 应用组装
//!
//! 根据配置创建各项能力、编排器和 HTTP 服务

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::{create_router, AppState};
use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::infrastructure::ChromeRenderer;
use crate::orchestrator::ChainOrchestrator;
use crate::services::{HttpFileFetcher, HttpSubmitter, LlmService};
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    config: Arc<Config>,
    state: Arc<AppState>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(config.port, config.chain_budget, config.per_call_timeout);

        let capabilities = build_capabilities(&config)?;
        let orchestrator = Arc::new(ChainOrchestrator::new(capabilities, &config));
        let config = Arc::new(config);

        let state = Arc::new(AppState {
            config: Arc::clone(&config),
            orchestrator,
        });

        Ok(Self { config, state })
    }

    /// 启动 HTTP 服务，直到收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;
        info!("✓ 服务已启动: http://{}", listener.local_addr()?);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

/// 创建生产环境的各项能力
pub fn build_capabilities(config: &Config) -> Result<Capabilities> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("quiz-chain-solver/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("创建 HTTP 客户端失败")?;

    let llm = Arc::new(LlmService::new(config));

    Ok(Capabilities {
        renderer: Arc::new(ChromeRenderer::new(config)),
        interpreter: llm.clone(),
        fetcher: Arc::new(HttpFileFetcher::new(http.clone())),
        solver: llm,
        submitter: Arc::new(HttpSubmitter::new(http)),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听退出信号失败: {}", e);
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭...");
}
