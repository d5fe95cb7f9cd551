use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 启动一个无头浏览器
///
/// 每次启动使用独立的用户数据目录，多个浏览器可以同时运行
///
/// # 参数
/// - `chrome_executable`: 浏览器路径，为空时由 chromiumoxide 自动查找
/// - `user_data_dir`: 本次启动的用户数据目录
///
/// # 返回
/// 返回浏览器和后台事件处理任务
pub async fn launch_headless_browser(
    chrome_executable: Option<&Path>,
    user_data_dir: &Path,
) -> Result<(Browser, JoinHandle<()>)> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .user_data_dir(user_data_dir)
        .args(vec![
            "--disable-gpu",           // 无头模式禁用 GPU
            "--no-sandbox",            // 容器内没有沙盒权限
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--disable-extensions",
        ]);
    if let Some(path) = chrome_executable {
        debug!("使用浏览器: {}", path.display());
        builder = builder.chrome_executable(path);
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        anyhow::anyhow!("配置无头浏览器失败: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        anyhow::anyhow!("启动无头浏览器失败: {}", e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}
