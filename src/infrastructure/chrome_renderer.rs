//! 页面渲染器 - 基础设施层
//!
//! 每次渲染启动一个新的无头浏览器，渲染完立即关闭，
//! 不同链路之间不共享浏览器

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::browser::launch_headless_browser;
use crate::capabilities::PageRenderer;
use crate::config::Config;
use crate::error::{QuizError, QuizResult, Stage};
use crate::infrastructure::JsExecutor;
use crate::models::RenderedPage;

/// 给关闭浏览器留出的时间
const CLOSE_MARGIN: Duration = Duration::from_millis(500);

/// 基于 chromiumoxide 的页面渲染器
pub struct ChromeRenderer {
    chrome_executable: Option<PathBuf>,
    settle: Duration,
}

impl ChromeRenderer {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_executable: config.chrome_executable.clone(),
            settle: config.render_settle,
        }
    }

    /// 在已启动的浏览器中打开页面并读取内容
    async fn render_in(&self, browser: &Browser, url: &Url, budget: Duration) -> Result<RenderedPage> {
        let started = tokio::time::Instant::now();

        let page = browser
            .new_page("about:blank")
            .await
            .context("创建页面失败")?;
        page.goto(url.as_str())
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        page.wait_for_navigation().await.context("等待页面加载失败")?;
        debug!("页面加载完成: {}", url);

        // 等待页面脚本把题目渲染出来，不超出预算
        let settle = self.settle.min(budget.saturating_sub(started.elapsed()));
        if !settle.is_zero() {
            sleep(settle).await;
        }

        let executor = JsExecutor::new(page);
        let html = executor.html().await.context("读取 HTML 失败")?;
        let text = executor.inner_text().await.context("读取页面文本失败")?;
        let final_url = executor
            .current_url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        if let Err(e) = executor.page().clone().close().await {
            debug!("关闭页面失败: {}", e);
        }

        Ok(RenderedPage {
            url: final_url,
            html,
            text,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> QuizResult<RenderedPage> {
        let user_data_dir = tempfile::Builder::new()
            .prefix("quiz-chrome-")
            .tempdir()
            .map_err(|e| QuizError::transport(Stage::Render, url.as_str(), e))?;

        let (mut browser, handler_task) =
            launch_headless_browser(self.chrome_executable.as_deref(), user_data_dir.path())
                .await
                .map_err(|e| QuizError::transport(Stage::Render, url.as_str(), format!("{:#}", e)))?;

        // 留一点时间给关闭浏览器
        let budget = timeout.saturating_sub(CLOSE_MARGIN).max(Duration::from_millis(100));
        let result = match tokio::time::timeout(budget, self.render_in(&browser, url, budget)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(QuizError::transport(Stage::Render, url.as_str(), format!("{:#}", e))),
            Err(_) => Err(QuizError::Timeout { stage: Stage::Render }),
        };

        if let Err(e) = browser.close().await {
            debug!("关闭浏览器失败: {}", e);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        if let Ok(page) = &result {
            info!(
                "✓ 渲染完成: {} (文本 {} 字符, HTML {} 字符)",
                page.url,
                page.text.chars().count(),
                page.html.len()
            );
        }
        result
    }
}
