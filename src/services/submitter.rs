//! 答案提交服务 - 业务能力层

use async_trait::async_trait;
use tracing::{debug, info};

use crate::capabilities::AnswerSubmitter;
use crate::error::{QuizError, QuizResult, Stage};
use crate::models::{Submission, SubmissionResponse, SubmissionResult};
use crate::utils::logging::truncate_text;

/// 把答案 POST 到题目给出的提交地址
///
/// 请求体：`{email, secret, url, answer}`；
/// 响应体：`{correct, url?, reason?}`
pub struct HttpSubmitter {
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerSubmitter for HttpSubmitter {
    async fn submit(&self, submission: &Submission) -> QuizResult<SubmissionResult> {
        let submit_url = &submission.submit_url;
        debug!("提交到: {}", submit_url);

        let response = self
            .client
            .post(submit_url.clone())
            .json(submission)
            .send()
            .await
            .map_err(|e| QuizError::transport(Stage::Submit, submit_url.as_str(), e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuizError::transport(Stage::Submit, submit_url.as_str(), e))?;

        // 答错时服务端可能返回 4xx 但仍带有 JSON 结果，所以先尝试解析
        let parsed: SubmissionResponse = serde_json::from_str(&body).map_err(|e| {
            QuizError::transport(
                Stage::Submit,
                submit_url.as_str(),
                format!("HTTP {} 响应无法解析 ({}): {}", status, e, truncate_text(&body, 200)),
            )
        })?;

        let result = parsed.into_result(submit_url);
        info!(
            "提交结果: correct={} next={:?} reason={:?}",
            result.correct,
            result.next_url.as_ref().map(|u| u.as_str()),
            result.message
        );
        Ok(result)
    }
}
