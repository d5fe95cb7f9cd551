//! 能力接口
//!
//! 编排层只认识这些 trait，不关心背后是浏览器、LLM 还是测试替身。
//! 生产实现见 `infrastructure::ChromeRenderer` 和 `services`。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::QuizResult;
use crate::models::{
    AnswerValue, DownloadedFile, FormatHint, QuizRecord, RenderedPage, Submission,
    SubmissionResult,
};

/// 渲染页面（执行 JS 后取内容）
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url, timeout: Duration) -> QuizResult<RenderedPage>;
}

/// 从页面内容中提取题目
#[async_trait]
pub trait QuestionInterpreter: Send + Sync {
    async fn interpret(&self, page: &RenderedPage) -> QuizResult<QuizRecord>;
}

/// 下载单个附件到指定目录
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> QuizResult<DownloadedFile>;
}

/// 求解输入
#[derive(Debug, Clone)]
pub struct SolveRequest<'a> {
    pub question: &'a str,
    pub answer_format: Option<FormatHint>,
    pub files: &'a [DownloadedFile],
    /// 上一次提交被拒绝时的反馈
    pub feedback: Option<&'a str>,
}

/// 根据题目和附件给出答案
#[async_trait]
pub trait AnswerSolver: Send + Sync {
    async fn solve(&self, request: &SolveRequest<'_>) -> QuizResult<AnswerValue>;
}

/// 提交答案
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit(&self, submission: &Submission) -> QuizResult<SubmissionResult>;
}

/// 一条链路需要的全部能力
#[derive(Clone)]
pub struct Capabilities {
    pub renderer: Arc<dyn PageRenderer>,
    pub interpreter: Arc<dyn QuestionInterpreter>,
    pub fetcher: Arc<dyn FileFetcher>,
    pub solver: Arc<dyn AnswerSolver>,
    pub submitter: Arc<dyn AnswerSubmitter>,
}
