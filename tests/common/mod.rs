//! 集成测试共用的能力替身
//!
//! 用一张"站点表"描述每个题目页：渲染耗时、解析结果、提交后的判定

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use quiz_chain_solver::capabilities::{
    AnswerSolver, AnswerSubmitter, Capabilities, FileFetcher, PageRenderer, QuestionInterpreter,
    SolveRequest,
};
use quiz_chain_solver::error::{QuizError, QuizResult, Stage};
use quiz_chain_solver::models::{
    AnswerValue, DownloadedFile, QuizRecord, RenderedPage, Submission, SubmissionResult,
};

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn record(question: &str, submit: &str, next: Option<&str>, files: &[&str]) -> QuizRecord {
    QuizRecord {
        question_text: question.to_string(),
        file_urls: files.iter().map(|f| url(f)).collect(),
        submit_url: url(submit),
        next_url: next.map(url),
        answer_format: None,
    }
}

pub fn verdict(correct: bool, next: Option<&str>, message: Option<&str>) -> SubmissionResult {
    SubmissionResult {
        correct,
        next_url: next.map(url),
        message: message.map(str::to_string),
    }
}

/// 渲染替身：可以给某些页面加延迟或让它失败
#[derive(Default)]
pub struct FakeRenderer {
    pub delays: HashMap<String, Duration>,
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, url: &Url, _timeout: Duration) -> QuizResult<RenderedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(url.as_str()) {
            return Err(QuizError::transport(Stage::Render, url.as_str(), "connection refused"));
        }
        Ok(RenderedPage {
            url: url.clone(),
            html: format!("<html><body>{}</body></html>", url),
            text: url.to_string(),
        })
    }
}

/// 解析替身：按页面 URL 查表；可以让前几次调用返回格式错误
#[derive(Default)]
pub struct FakeInterpreter {
    pub records: HashMap<String, QuizRecord>,
    pub malformed_first: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl QuestionInterpreter for FakeInterpreter {
    async fn interpret(&self, page: &RenderedPage) -> QuizResult<QuizRecord> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.malformed_first {
            return Err(QuizError::Interpretation("missing submit_url".to_string()));
        }
        self.records
            .get(page.url.as_str())
            .cloned()
            .ok_or_else(|| QuizError::Interpretation(format!("no quiz on {}", page.url)))
    }
}

/// 下载替身：不落盘，直接返回文件描述
#[derive(Default)]
pub struct FakeFetcher {
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FileFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> QuizResult<DownloadedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url.as_str()) {
            return Err(QuizError::transport(Stage::Fetch, url.as_str(), "HTTP 404"));
        }
        let name = url.path_segments().and_then(|s| s.last()).unwrap_or("file");
        Ok(DownloadedFile {
            url: url.clone(),
            path: PathBuf::from(dest_dir).join(name),
            content_type: "text/csv".to_string(),
            size: 64,
        })
    }
}

/// 求解替身：记录每次看到的附件数和反馈
///
/// 前 `fail_first` 次调用返回格式错误；第 `hang_on_call` 次调用（从 1 开始）一直不返回
#[derive(Default)]
pub struct FakeSolver {
    pub seen: Mutex<Vec<(usize, Option<String>)>>,
    pub fail_first: usize,
    pub hang_on_call: Option<usize>,
}

impl FakeSolver {
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerSolver for FakeSolver {
    async fn solve(&self, request: &SolveRequest<'_>) -> QuizResult<AnswerValue> {
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push((request.files.len(), request.feedback.map(str::to_string)));
            seen.len()
        };
        if self.hang_on_call == Some(call) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if call <= self.fail_first {
            return Err(QuizError::Solver("回复不是合法 JSON".to_string()));
        }
        Ok(AnswerValue::Text("42".to_string()))
    }
}

/// 提交替身：按提交地址依次给出判定，脚本用完后一律判对
///
/// `fail_next` 让某个提交地址接下来的几次调用返回网络错误
#[derive(Default)]
pub struct FakeSubmitter {
    pub scripts: Mutex<HashMap<String, VecDeque<SubmissionResult>>>,
    pub failures: Mutex<HashMap<String, usize>>,
    pub submitted: Mutex<Vec<Submission>>,
}

impl FakeSubmitter {
    pub fn script(&self, submit_url: &str, verdicts: Vec<SubmissionResult>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(submit_url.to_string(), verdicts.into());
    }

    pub fn fail_next(&self, submit_url: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(submit_url.to_string(), times);
    }

    pub fn calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerSubmitter for FakeSubmitter {
    async fn submit(&self, submission: &Submission) -> QuizResult<SubmissionResult> {
        self.submitted.lock().unwrap().push(submission.clone());

        let submit_url = submission.submit_url.as_str();
        if let Some(left) = self.failures.lock().unwrap().get_mut(submit_url) {
            if *left > 0 {
                *left -= 1;
                return Err(QuizError::transport(Stage::Submit, submit_url, "connection reset"));
            }
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(submit_url)
            .and_then(|queue| queue.pop_front());
        Ok(next.unwrap_or_else(|| verdict(true, None, None)))
    }
}

/// 一套替身，测试结束后可以检查调用情况
pub struct Fakes {
    pub renderer: Arc<FakeRenderer>,
    pub interpreter: Arc<FakeInterpreter>,
    pub fetcher: Arc<FakeFetcher>,
    pub solver: Arc<FakeSolver>,
    pub submitter: Arc<FakeSubmitter>,
}

impl Fakes {
    pub fn new(renderer: FakeRenderer, interpreter: FakeInterpreter, fetcher: FakeFetcher) -> Self {
        Self::with_solver(renderer, interpreter, fetcher, FakeSolver::default())
    }

    pub fn with_solver(
        renderer: FakeRenderer,
        interpreter: FakeInterpreter,
        fetcher: FakeFetcher,
        solver: FakeSolver,
    ) -> Self {
        Self {
            renderer: Arc::new(renderer),
            interpreter: Arc::new(interpreter),
            fetcher: Arc::new(fetcher),
            solver: Arc::new(solver),
            submitter: Arc::new(FakeSubmitter::default()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            renderer: self.renderer.clone(),
            interpreter: self.interpreter.clone(),
            fetcher: self.fetcher.clone(),
            solver: self.solver.clone(),
            submitter: self.submitter.clone(),
        }
    }
}

/// 由若干 (页面 URL, 题目) 组成的解析替身
pub fn interpreter_with(pages: Vec<(&str, QuizRecord)>) -> FakeInterpreter {
    FakeInterpreter {
        records: pages
            .into_iter()
            .map(|(page, rec)| (page.to_string(), rec))
            .collect(),
        ..Default::default()
    }
}
