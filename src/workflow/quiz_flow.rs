//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. render → interpret（解析失败可重试）
//! 2. fetch（附件并发下载，单个失败不影响整体）
//! 3. solve → submit（答错时带着反馈重试，次数受 `RetryPolicy` 限制）
//!
//! 每次网络调用的时间片都是 `min(per_call_timeout, 剩余时间)`

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::capabilities::{Capabilities, SolveRequest};
use crate::config::Config;
use crate::error::{QuizError, QuizResult, Stage};
use crate::models::{DownloadedFile, QuizRecord, RenderedPage, StepStatus, Submission};
use crate::utils::logging::truncate_text;
use crate::workflow::quiz_ctx::QuizCtx;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每道题最多提交几次（含第一次）
    pub max_answer_attempts: u32,
    /// 题目解析最多尝试几次
    pub max_interpret_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_answer_attempts: 2,
            max_interpret_attempts: 2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_answer_attempts: config.max_answer_attempts.max(1),
            max_interpret_attempts: config.max_interpret_attempts.max(1),
        }
    }
}

/// 单个步骤的处理结果
#[derive(Debug, Clone)]
pub struct StepResult {
    pub status: StepStatus,
    /// 提交次数
    pub attempts: u32,
    pub message: Option<String>,
    /// 提交结果给出的下一题，没有时退回题目自带的
    pub next_url: Option<Url>,
    /// 是否成功解析出了题目
    pub interpreted: bool,
    /// 步骤是被截止时间打断的
    pub deadline_hit: bool,
}

impl StepResult {
    /// 步骤因错误中止；截止时间错误记为被打断
    fn aborted(err: QuizError, attempts: u32, interpreted: bool, next_url: Option<Url>) -> Self {
        let deadline_hit = err.is_deadline();
        let status = if deadline_hit {
            StepStatus::Interrupted
        } else {
            StepStatus::Error
        };
        Self {
            status,
            attempts,
            message: Some(err.to_string()),
            next_url,
            interpreted,
            deadline_hit,
        }
    }
}

/// 题目处理流程
///
/// - 编排单道题的完整处理流程
/// - 决定何时重试、何时放弃
/// - 不持有任何资源，只依赖能力接口
pub struct QuizFlow {
    capabilities: Capabilities,
    policy: RetryPolicy,
    per_call_timeout: Duration,
    verbose_logging: bool,
}

impl QuizFlow {
    pub fn new(
        capabilities: Capabilities,
        policy: RetryPolicy,
        per_call_timeout: Duration,
        verbose_logging: bool,
    ) -> Self {
        Self {
            capabilities,
            policy,
            per_call_timeout,
            verbose_logging,
        }
    }

    pub async fn run(&self, ctx: &QuizCtx, work_dir: &Path) -> StepResult {
        info!("{} 🌐 渲染页面: {}", ctx, ctx.quiz_url);

        // ========== 1. 渲染 ==========
        let page = match self.render(ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("{} ⚠️ 渲染失败: {}", ctx, e);
                return StepResult::aborted(e, 0, false, None);
            }
        };

        // ========== 2. 解析 ==========
        let record = match self.interpret(ctx, &page).await {
            Ok(record) => record,
            Err(e) => {
                warn!("{} ⚠️ 题目解析失败: {}", ctx, e);
                return StepResult::aborted(e, 0, false, None);
            }
        };
        self.log_record(ctx, &record);

        // ========== 3. 下载附件 ==========
        let files = match self.fetch_files(ctx, &record, work_dir).await {
            Ok(files) => files,
            Err(e) => return StepResult::aborted(e, 0, true, record.next_url.clone()),
        };

        // ========== 4. 求解并提交 ==========
        self.answer(ctx, &record, &files).await
    }

    /// 给调用加上时间片限制
    ///
    /// 时间片用完时，如果总截止时间也过了就返回 `DeadlineExceeded`，否则是普通超时
    async fn bounded<T, F>(&self, ctx: &QuizCtx, stage: Stage, slot: Duration, fut: F) -> QuizResult<T>
    where
        F: Future<Output = QuizResult<T>>,
    {
        match tokio::time::timeout(slot, fut).await {
            Ok(result) => result,
            Err(_) if ctx.deadline_passed() => Err(QuizError::DeadlineExceeded),
            Err(_) => Err(QuizError::Timeout { stage }),
        }
    }

    async fn render(&self, ctx: &QuizCtx) -> QuizResult<RenderedPage> {
        let slot = ctx.call_budget(self.per_call_timeout)?;
        self.bounded(
            ctx,
            Stage::Render,
            slot,
            self.capabilities.renderer.render(&ctx.quiz_url, slot),
        )
        .await
    }

    /// 解析题目，LLM 输出不符合结构时重试
    async fn interpret(&self, ctx: &QuizCtx, page: &RenderedPage) -> QuizResult<QuizRecord> {
        let mut last_error = QuizError::Interpretation("未尝试解析".to_string());

        for attempt in 1..=self.policy.max_interpret_attempts {
            let slot = ctx.call_budget(self.per_call_timeout)?;
            match self
                .bounded(ctx, Stage::Interpret, slot, self.capabilities.interpreter.interpret(page))
                .await
            {
                Ok(record) => return Ok(record),
                Err(e @ QuizError::Interpretation(_)) => {
                    warn!(
                        "{} 解析结果不合格 ({}/{}): {}",
                        ctx, attempt, self.policy.max_interpret_attempts, e
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    /// 并发下载所有附件
    ///
    /// 单个文件失败只记日志；只有截止时间到了才整体返回错误
    async fn fetch_files(
        &self,
        ctx: &QuizCtx,
        record: &QuizRecord,
        work_dir: &Path,
    ) -> QuizResult<Vec<DownloadedFile>> {
        if record.file_urls.is_empty() {
            return Ok(Vec::new());
        }

        info!("{} 📥 下载 {} 个附件", ctx, record.file_urls.len());
        let slot = ctx.call_budget(self.per_call_timeout)?;

        let downloads = record.file_urls.iter().map(|url| async move {
            let result = self
                .bounded(
                    ctx,
                    Stage::Fetch,
                    slot,
                    self.capabilities.fetcher.fetch(url, work_dir),
                )
                .await;
            (url, result)
        });

        let mut files = Vec::new();
        for (url, result) in join_all(downloads).await {
            match result {
                Ok(file) => {
                    debug!("{} ✓ 已下载 {} ({} 字节)", ctx, url, file.size);
                    files.push(file);
                }
                Err(QuizError::DeadlineExceeded) => return Err(QuizError::DeadlineExceeded),
                Err(e) => warn!("{} ⚠️ 附件下载失败，跳过 {}: {}", ctx, url, e),
            }
        }

        info!(
            "{} ✓ 附件下载完成: {}/{}",
            ctx,
            files.len(),
            record.file_urls.len()
        );
        Ok(files)
    }

    /// 求解并提交，答错时带着反馈重试
    async fn answer(
        &self,
        ctx: &QuizCtx,
        record: &QuizRecord,
        files: &[DownloadedFile],
    ) -> StepResult {
        let max_attempts = self.policy.max_answer_attempts;
        let mut attempts = 0u32;
        let mut feedback: Option<String> = None;
        let mut submitted_next: Option<Url> = None;
        let mut rejection: Option<String> = None;
        let mut last_error: Option<QuizError> = None;

        while attempts < max_attempts {
            if attempts > 0 && ctx.deadline_passed() {
                info!("{} ⏰ 没有时间再重试了", ctx);
                return self.cut_short(attempts, rejection, submitted_next, record);
            }
            attempts += 1;
            info!("{} 🧠 第 {}/{} 次求解", ctx, attempts, max_attempts);

            let request = SolveRequest {
                question: &record.question_text,
                answer_format: record.answer_format,
                files,
                feedback: feedback.as_deref(),
            };

            let answer = match self.solve(ctx, &request).await {
                Ok(answer) => answer,
                Err(QuizError::DeadlineExceeded) => {
                    return self.cut_short(attempts, rejection, submitted_next, record);
                }
                Err(e) => {
                    warn!("{} ⚠️ 求解失败: {}", ctx, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let answer_json = serde_json::to_string(&answer).unwrap_or_default();
            info!("{} 📤 提交答案: {}", ctx, truncate_text(&answer_json, 200));

            let submission = Submission {
                email: ctx.email.clone(),
                secret: ctx.secret.clone(),
                url: ctx.quiz_url.to_string(),
                answer,
                submit_url: record.submit_url.clone(),
            };

            match self.submit(ctx, &submission).await {
                Ok(result) if result.correct => {
                    info!("{} ✅ 回答正确", ctx);
                    return StepResult {
                        status: StepStatus::Correct,
                        attempts,
                        message: result.message,
                        next_url: result.next_url.or_else(|| record.next_url.clone()),
                        interpreted: true,
                        deadline_hit: false,
                    };
                }
                Ok(result) => {
                    let reason = result
                        .message
                        .clone()
                        .unwrap_or_else(|| "no reason given".to_string());
                    warn!("{} ❌ 回答错误: {}", ctx, reason);
                    feedback = Some(format!(
                        "Your previous answer {} was rejected: {}",
                        answer_json, reason
                    ));
                    rejection = Some(reason);
                    if result.next_url.is_some() {
                        submitted_next = result.next_url;
                    }
                }
                Err(QuizError::DeadlineExceeded) => {
                    return self.cut_short(attempts, rejection, submitted_next, record);
                }
                Err(e) => {
                    warn!("{} ⚠️ 提交失败: {}", ctx, e);
                    last_error = Some(e);
                }
            }
        }

        let next_url = submitted_next.or_else(|| record.next_url.clone());
        match rejection {
            Some(reason) => StepResult {
                status: StepStatus::Incorrect,
                attempts,
                message: Some(reason),
                next_url,
                interpreted: true,
                deadline_hit: false,
            },
            None => StepResult::aborted(
                last_error.unwrap_or(QuizError::Solver("没有可提交的答案".to_string())),
                attempts,
                true,
                next_url,
            ),
        }
    }

    /// 重试途中截止时间到了：已经被判错过就算答错，否则算被打断
    fn cut_short(
        &self,
        attempts: u32,
        rejection: Option<String>,
        submitted_next: Option<Url>,
        record: &QuizRecord,
    ) -> StepResult {
        let next_url = submitted_next.or_else(|| record.next_url.clone());
        match rejection {
            Some(reason) => StepResult {
                status: StepStatus::Incorrect,
                attempts,
                message: Some(reason),
                next_url,
                interpreted: true,
                deadline_hit: true,
            },
            None => StepResult::aborted(QuizError::DeadlineExceeded, attempts, true, next_url),
        }
    }

    async fn solve(
        &self,
        ctx: &QuizCtx,
        request: &SolveRequest<'_>,
    ) -> QuizResult<crate::models::AnswerValue> {
        let slot = ctx.call_budget(self.per_call_timeout)?;
        self.bounded(ctx, Stage::Solve, slot, self.capabilities.solver.solve(request))
            .await
    }

    async fn submit(
        &self,
        ctx: &QuizCtx,
        submission: &Submission,
    ) -> QuizResult<crate::models::SubmissionResult> {
        let slot = ctx.call_budget(self.per_call_timeout)?;
        self.bounded(
            ctx,
            Stage::Submit,
            slot,
            self.capabilities.submitter.submit(submission),
        )
        .await
    }

    // ========== 日志辅助方法 ==========

    fn log_record(&self, ctx: &QuizCtx, record: &QuizRecord) {
        info!("{} 题干: {}", ctx, truncate_text(&record.question_text, 80));
        if self.verbose_logging {
            info!("{}   提交地址: {}", ctx, record.submit_url);
            info!("{}   附件: {:?}", ctx, record.file_urls);
            info!("{}   答案格式: {:?}", ctx, record.answer_format);
            info!("{}   下一题: {:?}", ctx, record.next_url);
        }
    }
}
