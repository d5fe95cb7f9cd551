//! 答题链路处理器 - 编排层
//!
//! ## 职责
//!
//! 从起始 URL 开始，一题接一题地处理，直到没有下一题或者截止时间到了。
//!
//! ## 核心功能
//!
//! 1. **截止时间**：每道题开始前检查，过了就立即返回部分结果
//! 2. **流程调度**：单道题委托给 `QuizFlow`
//! 3. **跟随链接**：优先使用提交结果里的下一题，其次是题目页面自带的
//! 4. **资源隔离**：每条链路一个独立的下载目录，结束时删除
//! 5. **失败记录**：失败或被打断的步骤写入 warn 文件

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::models::{ChainOutcome, QuizTask, StepReport, StepStatus, TerminalReason};
use crate::services::WarnWriter;
use crate::utils::logging::{log_chain_start, log_step_start, print_chain_summary};
use crate::workflow::{QuizCtx, QuizFlow, RetryPolicy, StepResult};

/// 链路编排器
///
/// 不保存任何链路状态，多个请求可以同时调用 `run`
pub struct ChainOrchestrator {
    flow: QuizFlow,
    warn_writer: WarnWriter,
    download_root: Option<PathBuf>,
    chain_counter: AtomicU64,
}

impl ChainOrchestrator {
    /// 按配置创建编排器
    pub fn new(capabilities: Capabilities, config: &Config) -> Self {
        let flow = QuizFlow::new(
            capabilities,
            RetryPolicy::from_config(config),
            config.per_call_timeout,
            config.verbose_logging,
        );
        Self::with_parts(
            flow,
            WarnWriter::with_path(&config.warn_file),
            config.download_dir.clone(),
        )
    }

    pub fn with_parts(flow: QuizFlow, warn_writer: WarnWriter, download_root: Option<PathBuf>) -> Self {
        Self {
            flow,
            warn_writer,
            download_root,
            chain_counter: AtomicU64::new(0),
        }
    }

    /// 处理一整条链路
    ///
    /// 步骤级错误不会向上抛出，调用方总能拿到一份结果
    pub async fn run(&self, task: &QuizTask) -> ChainOutcome {
        let started = Instant::now();
        let chain_id = format!("{:04}", self.chain_counter.fetch_add(1, Ordering::Relaxed) + 1);
        log_chain_start(&chain_id, task, task.deadline.saturating_duration_since(started));

        let mut outcome = ChainOutcome::default();

        let work_dir = match self.create_work_dir(&chain_id) {
            Ok(dir) => dir,
            Err(e) => {
                error!("[链路 {}] ❌ 无法创建下载目录: {:#}", chain_id, e);
                outcome.terminal_reason = TerminalReason::FatalError;
                outcome.elapsed_ms = started.elapsed().as_millis() as u64;
                return outcome;
            }
        };

        let mut current_url = Some(task.start_url.clone());
        let mut step_index = 0usize;

        let terminal_reason = loop {
            let Some(quiz_url) = current_url.take() else {
                break TerminalReason::ExhaustedChain;
            };
            if Instant::now() >= task.deadline {
                warn!("[链路 {}] ⏰ 截止时间已到，停止处理 {}", chain_id, quiz_url);
                break TerminalReason::DeadlineExceeded;
            }

            step_index += 1;
            log_step_start(&chain_id, step_index);

            let ctx = QuizCtx {
                chain_id: chain_id.clone(),
                step_index,
                quiz_url,
                email: task.email.clone(),
                secret: task.secret.clone(),
                deadline: task.deadline,
            };

            let result = self.flow.run(&ctx, work_dir.path()).await;
            let status = result.status;
            self.record_step(&ctx, &result, &mut outcome).await;

            if result.deadline_hit {
                warn!("{} ⏰ 截止时间已到，链路结束", ctx);
                break TerminalReason::DeadlineExceeded;
            }

            match result.next_url {
                Some(next) => {
                    info!("{} ➡️ 下一题: {}", ctx, next);
                    current_url = Some(next);
                }
                None if status == StepStatus::Error && !result.interpreted => {
                    error!("{} ❌ 步骤失败且没有下一题可跳转", ctx);
                    break TerminalReason::FatalError;
                }
                None => {
                    info!("{} 🏁 没有下一题，链路结束", ctx);
                    break TerminalReason::ExhaustedChain;
                }
            }
        };

        outcome.terminal_reason = terminal_reason;
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = work_dir.close() {
            warn!("[链路 {}] ⚠️ 清理下载目录失败: {}", chain_id, e);
        }

        print_chain_summary(&chain_id, &outcome);
        outcome
    }

    fn create_work_dir(&self, chain_id: &str) -> Result<TempDir> {
        let prefix = format!("quiz-chain-{}-", chain_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        match &self.download_root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("无法创建目录: {}", root.display()))?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("无法在 {} 下创建临时目录", root.display()))
            }
            None => builder.tempdir().context("无法创建临时目录"),
        }
    }

    async fn record_step(&self, ctx: &QuizCtx, result: &StepResult, outcome: &mut ChainOutcome) {
        let report = StepReport {
            index: ctx.step_index,
            url: ctx.quiz_url.to_string(),
            status: result.status,
            attempts: result.attempts,
            message: result.message.clone(),
        };

        if report.status != StepStatus::Correct {
            if let Err(e) = self.warn_writer.write(&ctx.chain_id, &report).await {
                warn!("{} ⚠️ 写入 warn 文件失败: {}", ctx, e);
            }
        }

        outcome.record(report);
    }
}
