//! 题目链路的数据模型

use std::path::PathBuf;

use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::error::{QuizError, QuizResult};
use crate::utils::text::{extract_json_object, resolve_http_url, strip_code_fence};

/// 一次答题请求
///
/// 由入口层创建，整条链路只读
#[derive(Debug, Clone)]
pub struct QuizTask {
    pub email: String,
    pub secret: String,
    pub start_url: Url,
    /// 整条链路必须结束的时刻
    pub deadline: Instant,
    pub received_at: DateTime<Utc>,
}

impl QuizTask {
    /// 以当前时刻加预算作为截止时间
    pub fn new(
        email: impl Into<String>,
        secret: impl Into<String>,
        start_url: Url,
        budget: std::time::Duration,
    ) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
            start_url,
            deadline: Instant::now() + budget,
            received_at: Utc::now(),
        }
    }
}

/// 渲染后的页面
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: Url,
    pub html: String,
    /// body 的 innerText
    pub text: String,
}

/// 下载到本地的附件
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub url: Url,
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
}

/// 答案格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    Boolean,
    Number,
    Text,
    Json,
    Base64,
}

/// 题目对答案格式的要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHint {
    pub format: AnswerFormat,
    /// 提示里直接写了类型名（如 "json"、"integer"），不是从 "list" 之类的词猜的
    pub explicit: bool,
}

impl FormatHint {
    pub fn exact(format: AnswerFormat) -> Self {
        Self {
            format,
            explicit: true,
        }
    }

    pub fn loose(format: AnswerFormat) -> Self {
        Self {
            format,
            explicit: false,
        }
    }
}

impl AnswerFormat {
    /// 从 LLM 给出的自由文本描述推断格式
    ///
    /// 按整词匹配，明确的类型名优先于 "list"、"number" 这类宽泛的词。
    /// 例如 "integer" → Number，"true/false" → Boolean
    pub fn from_hint(hint: &str) -> Option<FormatHint> {
        let hint = hint.to_lowercase();
        let has_word = |words: &str| {
            Regex::new(&format!(r"\b(?:{})\b", words))
                .map(|re| re.is_match(&hint))
                .unwrap_or(false)
        };

        if has_word("base64|data uri|data url") {
            Some(FormatHint::exact(AnswerFormat::Base64))
        } else if has_word("json") {
            Some(FormatHint::exact(AnswerFormat::Json))
        } else if has_word("bool|boolean") || hint.contains("true/false") || hint.contains("yes/no") {
            Some(FormatHint::exact(AnswerFormat::Boolean))
        } else if has_word("string|text") {
            Some(FormatHint::exact(AnswerFormat::Text))
        } else if has_word("int|integer|float|decimal|numeric") {
            Some(FormatHint::exact(AnswerFormat::Number))
        } else if has_word("number") {
            Some(FormatHint::loose(AnswerFormat::Number))
        } else if has_word("object|array|list|dict|dictionary") {
            Some(FormatHint::loose(AnswerFormat::Json))
        } else if has_word("word") {
            Some(FormatHint::loose(AnswerFormat::Text))
        } else {
            None
        }
    }
}

/// LLM 解析页面后得到的原始结构
///
/// 字段名兼容几种常见写法，校验在 [`QuizRecord::from_raw`] 中进行
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuizRecord {
    #[serde(alias = "question_text")]
    pub question: String,
    #[serde(default)]
    pub file_urls: Option<Vec<String>>,
    #[serde(alias = "submit_endpoint")]
    pub submit_url: String,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub answer_format: Option<String>,
}

/// 校验过的题目
#[derive(Debug, Clone)]
pub struct QuizRecord {
    pub question_text: String,
    pub file_urls: Vec<Url>,
    pub submit_url: Url,
    pub next_url: Option<Url>,
    pub answer_format: Option<FormatHint>,
}

impl QuizRecord {
    /// 从 LLM 回复文本解析题目
    pub fn parse_reply(reply: &str, page_url: &Url) -> QuizResult<Self> {
        let body = strip_code_fence(reply);
        let json = extract_json_object(body)
            .ok_or_else(|| QuizError::Interpretation("回复中没有 JSON 对象".to_string()))?;
        let raw: RawQuizRecord = serde_json::from_str(json)
            .map_err(|e| QuizError::Interpretation(format!("JSON 结构不符: {}", e)))?;
        Self::from_raw(raw, page_url)
    }

    /// 校验原始结构，相对链接按页面 URL 解析
    pub fn from_raw(raw: RawQuizRecord, page_url: &Url) -> QuizResult<Self> {
        let question_text = raw.question.trim().to_string();
        if question_text.is_empty() {
            return Err(QuizError::Interpretation("题干为空".to_string()));
        }

        let submit_url = resolve_http_url(page_url, &raw.submit_url).ok_or_else(|| {
            QuizError::Interpretation(format!("提交地址不合法: '{}'", raw.submit_url))
        })?;

        let mut file_urls = Vec::new();
        for link in raw.file_urls.unwrap_or_default() {
            match resolve_http_url(page_url, &link) {
                Some(url) => file_urls.push(url),
                None => warn!("忽略不合法的附件地址: '{}'", link),
            }
        }

        let next_url = raw
            .next_url
            .as_deref()
            .and_then(|link| resolve_http_url(page_url, link));

        Ok(Self {
            question_text,
            file_urls,
            submit_url,
            next_url,
            answer_format: raw.answer_format.as_deref().and_then(AnswerFormat::from_hint),
        })
    }
}

/// 求解得到的答案
///
/// 序列化时直接输出值本身，base64 以字符串形式提交
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Boolean(bool),
    Number(serde_json::Number),
    Text(String),
    Json(JsonValue),
    Base64(String),
}

impl AnswerValue {
    /// 把 LLM 的回复转换成要求的格式
    ///
    /// 明确要求的格式无法转换时返回 `Solver` 错误，不把原文当答案提交；
    /// 从宽泛词猜出的 JSON / 数字格式转换失败时按文本提交
    pub fn coerce(reply: &str, hint: Option<FormatHint>) -> QuizResult<Self> {
        let text = strip_code_fence(reply);
        if text.is_empty() {
            return Err(QuizError::Solver("回复为空".to_string()));
        }

        let Some(hint) = hint else {
            return Ok(AnswerValue::Text(unquote(text).to_string()));
        };

        let coerced = match hint.format {
            AnswerFormat::Text => Ok(AnswerValue::Text(unquote(text).to_string())),
            // 猜出来的数字格式要求整个回复就是一个数
            AnswerFormat::Number if !hint.explicit => {
                parse_whole_number(text).map(AnswerValue::Number)
            }
            AnswerFormat::Number => parse_number(text).map(AnswerValue::Number),
            AnswerFormat::Boolean => parse_boolean(text).map(AnswerValue::Boolean),
            AnswerFormat::Json => parse_json(text).map(AnswerValue::Json),
            AnswerFormat::Base64 => parse_base64(text).map(AnswerValue::Base64),
        };

        match coerced {
            Err(e) if !hint.explicit => {
                debug!("格式 {:?} 是猜的，转换失败按文本提交: {}", hint.format, e);
                Ok(AnswerValue::Text(unquote(text).to_string()))
            }
            other => other,
        }
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

fn parse_number(text: &str) -> QuizResult<serde_json::Number> {
    // 去掉千分位
    let digits = Regex::new(r"(\d),(\d{3})")
        .map_err(|e| QuizError::Solver(e.to_string()))?
        .replace_all(text, "$1$2")
        .into_owned();
    let re = Regex::new(r"-?\d+(?:\.\d+)?").map_err(|e| QuizError::Solver(e.to_string()))?;
    let found = re
        .find(&digits)
        .ok_or_else(|| QuizError::Solver(format!("回复中没有数字: '{}'", text)))?
        .as_str();

    if let Ok(int) = found.parse::<i64>() {
        return Ok(serde_json::Number::from(int));
    }
    found
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| QuizError::Solver(format!("数字无法解析: '{}'", found)))
}

fn parse_whole_number(text: &str) -> QuizResult<serde_json::Number> {
    let plain = unquote(text).trim().replace(',', "");
    let re = Regex::new(r"^-?\d+(?:\.\d+)?$").map_err(|e| QuizError::Solver(e.to_string()))?;
    if !re.is_match(&plain) {
        return Err(QuizError::Solver(format!("回复不是单个数字: '{}'", text)));
    }
    parse_number(&plain)
}

fn parse_boolean(text: &str) -> QuizResult<bool> {
    let re = Regex::new(r"(?i)\b(true|yes|false|no)\b").map_err(|e| QuizError::Solver(e.to_string()))?;
    let word = re
        .find(text)
        .ok_or_else(|| QuizError::Solver(format!("回复中没有布尔值: '{}'", text)))?
        .as_str()
        .to_lowercase();
    Ok(word == "true" || word == "yes")
}

fn parse_json(text: &str) -> QuizResult<JsonValue> {
    if let Ok(value) = serde_json::from_str::<JsonValue>(text) {
        return Ok(value);
    }
    extract_json_object(text)
        .and_then(|obj| serde_json::from_str::<JsonValue>(obj).ok())
        .ok_or_else(|| QuizError::Solver("回复不是合法 JSON".to_string()))
}

fn parse_base64(text: &str) -> QuizResult<String> {
    let text = unquote(text).trim();
    if text.starts_with("data:") && text.contains(";base64,") {
        return Ok(text.to_string());
    }
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map(|_| text.to_string())
        .map_err(|e| QuizError::Solver(format!("回复不是合法 base64: {}", e)))
}

/// 提交服务返回的原始响应
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default)]
    pub correct: bool,
    #[serde(default, alias = "next_url")]
    pub url: Option<String>,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub correct: bool,
    pub next_url: Option<Url>,
    pub message: Option<String>,
}

impl SubmissionResponse {
    /// 相对的下一题地址按提交地址解析
    pub fn into_result(self, submit_url: &Url) -> SubmissionResult {
        SubmissionResult {
            correct: self.correct,
            next_url: self
                .url
                .as_deref()
                .and_then(|link| resolve_http_url(submit_url, link)),
            message: self.reason.filter(|m| !m.trim().is_empty()),
        }
    }
}

/// 提交内容
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub email: String,
    pub secret: String,
    /// 当前题目页面的地址
    pub url: String,
    pub answer: AnswerValue,
    #[serde(skip)]
    pub submit_url: Url,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Url {
        Url::parse("https://quiz.example.com/demo").unwrap()
    }

    #[test]
    fn test_parse_reply_with_fence_and_relative_links() {
        let reply = r#"```json
{"question": "Sum the value column", "file_urls": ["/data.csv", "ftp://bad"], "submit_url": "/submit", "answer_format": "integer"}
```"#;
        let record = QuizRecord::parse_reply(reply, &page()).unwrap();
        assert_eq!(record.question_text, "Sum the value column");
        assert_eq!(record.file_urls.len(), 1);
        assert_eq!(record.file_urls[0].as_str(), "https://quiz.example.com/data.csv");
        assert_eq!(record.submit_url.as_str(), "https://quiz.example.com/submit");
        assert_eq!(record.answer_format, Some(FormatHint::exact(AnswerFormat::Number)));
        assert!(record.next_url.is_none());
    }

    #[test]
    fn test_parse_reply_accepts_null_files() {
        let reply = r#"{"question_text": "q", "file_urls": null, "submit_url": "https://s.example.com/a"}"#;
        let record = QuizRecord::parse_reply(reply, &page()).unwrap();
        assert!(record.file_urls.is_empty());
    }

    #[test]
    fn test_parse_reply_rejects_missing_submit_url() {
        let err = QuizRecord::parse_reply(r#"{"question": "q"}"#, &page()).unwrap_err();
        assert!(matches!(err, QuizError::Interpretation(_)));
    }

    #[test]
    fn test_parse_reply_rejects_empty_question() {
        let err =
            QuizRecord::parse_reply(r#"{"question": "  ", "submit_url": "/s"}"#, &page()).unwrap_err();
        assert!(matches!(err, QuizError::Interpretation(_)));
    }

    #[test]
    fn test_parse_reply_rejects_prose() {
        let err = QuizRecord::parse_reply("I could not find a quiz.", &page()).unwrap_err();
        assert!(matches!(err, QuizError::Interpretation(_)));
    }

    fn format_of(hint: &str) -> Option<AnswerFormat> {
        AnswerFormat::from_hint(hint).map(|h| h.format)
    }

    #[test]
    fn test_format_hints() {
        assert_eq!(format_of("Integer"), Some(AnswerFormat::Number));
        assert_eq!(format_of("true/false"), Some(AnswerFormat::Boolean));
        assert_eq!(format_of("JSON object"), Some(AnswerFormat::Json));
        assert_eq!(format_of("base64 image"), Some(AnswerFormat::Base64));
        assert_eq!(format_of("a string"), Some(AnswerFormat::Text));
        assert_eq!(format_of("???"), None);
    }

    #[test]
    fn test_format_hints_match_whole_words() {
        // "international" 里的 int 不算
        assert_eq!(
            AnswerFormat::from_hint("phone number string in international format"),
            Some(FormatHint::exact(AnswerFormat::Text))
        );
        assert_eq!(format_of("the city name from the list"), Some(AnswerFormat::Json));
        assert!(!AnswerFormat::from_hint("the city name from the list").unwrap().explicit);
        // name / count / sum 不再推断格式
        assert_eq!(format_of("the name"), None);
        assert_eq!(format_of("count of rows"), None);
        assert_eq!(format_of("sum of values"), None);
        assert_eq!(format_of("an integer"), Some(AnswerFormat::Number));
        assert!(AnswerFormat::from_hint("an integer").unwrap().explicit);
    }

    #[test]
    fn test_coerce_loose_hint_falls_back_to_text() {
        let list_hint = AnswerFormat::from_hint("the city name from the list");
        assert_eq!(
            AnswerValue::coerce("Paris", list_hint).unwrap(),
            AnswerValue::Text("Paris".to_string())
        );

        let number_hint = AnswerFormat::from_hint("the phone number");
        assert_eq!(
            AnswerValue::coerce("+44 20 7946 0958", number_hint).unwrap(),
            AnswerValue::Text("+44 20 7946 0958".to_string())
        );
        assert_eq!(
            AnswerValue::coerce("1,024", number_hint).unwrap(),
            AnswerValue::Number(1024.into())
        );

        // 明确要求的格式仍然严格
        let json_hint = AnswerFormat::from_hint("json");
        assert!(AnswerValue::coerce("Paris", json_hint).is_err());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(
            AnswerValue::coerce("The total is 12,345.", Some(FormatHint::exact(AnswerFormat::Number))).unwrap(),
            AnswerValue::Number(12345.into())
        );
        let float = AnswerValue::coerce("-3.5", Some(FormatHint::exact(AnswerFormat::Number))).unwrap();
        assert_eq!(serde_json::to_value(&float).unwrap(), json!(-3.5));
        assert!(AnswerValue::coerce("none", Some(FormatHint::exact(AnswerFormat::Number))).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            AnswerValue::coerce("Yes, it is.", Some(FormatHint::exact(AnswerFormat::Boolean))).unwrap(),
            AnswerValue::Boolean(true)
        );
        assert_eq!(
            AnswerValue::coerce("FALSE", Some(FormatHint::exact(AnswerFormat::Boolean))).unwrap(),
            AnswerValue::Boolean(false)
        );
        // "know" 不能被当成 "no"
        assert!(AnswerValue::coerce("I don't know", Some(FormatHint::exact(AnswerFormat::Boolean))).is_err());
    }

    #[test]
    fn test_coerce_json_and_text() {
        let value = AnswerValue::coerce("```json\n{\"a\": [1, 2]}\n```", Some(FormatHint::exact(AnswerFormat::Json))).unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"a": [1, 2]}));
        assert!(AnswerValue::coerce("not json", Some(FormatHint::exact(AnswerFormat::Json))).is_err());

        let text = AnswerValue::coerce("\"Paris\"", None).unwrap();
        assert_eq!(text, AnswerValue::Text("Paris".to_string()));
    }

    #[test]
    fn test_coerce_base64() {
        assert!(AnswerValue::coerce("aGVsbG8=", Some(FormatHint::exact(AnswerFormat::Base64))).is_ok());
        assert!(AnswerValue::coerce("data:image/png;base64,iVBORw0KGgo=", Some(FormatHint::exact(AnswerFormat::Base64))).is_ok());
        assert!(AnswerValue::coerce("not base64 !!", Some(FormatHint::exact(AnswerFormat::Base64))).is_err());
    }

    #[test]
    fn test_submission_response_aliases() {
        let submit = Url::parse("https://quiz.example.com/submit").unwrap();
        let resp: SubmissionResponse =
            serde_json::from_value(json!({"correct": false, "next_url": "/q2", "message": "off by one"}))
                .unwrap();
        let result = resp.into_result(&submit);
        assert!(!result.correct);
        assert_eq!(result.next_url.unwrap().as_str(), "https://quiz.example.com/q2");
        assert_eq!(result.message.as_deref(), Some("off by one"));
    }

    #[test]
    fn test_submission_serializes_bare_answer() {
        let submission = Submission {
            email: "a@b.c".into(),
            secret: "s".into(),
            url: "https://quiz.example.com/demo".into(),
            answer: AnswerValue::Number(42.into()),
            submit_url: Url::parse("https://quiz.example.com/submit").unwrap(),
        };
        let body = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            body,
            json!({"email": "a@b.c", "secret": "s", "url": "https://quiz.example.com/demo", "answer": 42})
        );
    }
}
