//! 警告写入服务 - 业务能力层
//!
//! 只负责"把失败的步骤追加到 warn 文件"，不关心流程

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::StepReport;

/// 警告写入服务
///
/// 每行一条记录：时间 | 链路 | 序号 | 状态 | URL | 原因
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 使用指定的文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 追加一条失败记录
    pub async fn write(&self, chain_id: &str, report: &StepReport) -> Result<()> {
        debug!(
            "写入警告: 链路 {} | 题目 {} | {:?}",
            chain_id, report.index, report.status
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await
            .with_context(|| format!("无法打开 {}", self.warn_file_path))?;

        let reason = report
            .message
            .as_deref()
            .unwrap_or("-")
            .replace('\n', " ");
        let warn_msg = format!(
            "{} | 链路 {} | 题目 {} | {:?} | {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            chain_id,
            report.index,
            report.status,
            report.url,
            reason
        );

        file.write_all(warn_msg.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
