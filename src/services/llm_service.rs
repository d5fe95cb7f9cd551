//! LLM 服务 - 业务能力层
//!
//! 负责"看懂题目"和"求解"两种能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use tracing::{debug, warn};

use crate::capabilities::{AnswerSolver, QuestionInterpreter, SolveRequest};
use crate::config::Config;
use crate::error::{QuizError, QuizResult, Stage};
use crate::models::{
    AnswerFormat, AnswerValue, DownloadedFile, FormatHint, QuizRecord, RenderedPage,
};
use crate::utils::logging::truncate_text;

const INTERPRETER_SYSTEM_PROMPT: &str = "You are a quiz parser. You read rendered quiz pages and \
extract structured information. Reply with a single JSON object and nothing else.";

const SOLVER_SYSTEM_PROMPT: &str = "You are a data analysis expert. Answer questions about data \
accurately and concisely. Reply with the answer only, no explanation.";

/// 页面中最多列出的链接数
const MAX_LINKS: usize = 50;

/// LLM 服务
///
/// 职责：
/// - 把渲染后的页面解析成结构化题目
/// - 根据题目和附件给出答案（支持图片）
/// - 不出现链路 / 重试逻辑
pub struct LlmService {
    client: Client<OpenAIConfig>,
    interpreter_model: String,
    solver_model: String,
    max_file_chars: usize,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            interpreter_model: config.interpreter_model.clone(),
            solver_model: config.solver_model.clone(),
            max_file_chars: config.max_file_chars,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `model`: 模型名称
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 列表（可选，支持 data URL），会追加到用户消息中
    /// - `response_format`: 输出格式约束（可选），读题时要求 JSON 对象
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", user_message.len());

        let request =
            Self::build_request(model, user_message, system_message, imgs, response_format)?;
        self.complete(request).await
    }

    /// 组装一次对话补全请求
    fn build_request(
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
        response_format: Option<ResponseFormat>,
    ) -> Result<CreateChatCompletionRequest> {

        // 构建消息列表
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        // 构建用户消息内容（支持图片）
        let user_msg = match imgs {
            Some(img_urls) if !img_urls.is_empty() => {
                // 使用 Vision API：构建包含文本和图片的内容
                let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                    Vec::new();

                content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                ));

                for url in img_urls.iter() {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ));
                }

                debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(
                        content_parts,
                    ))
                    .build()?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(model)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(2000u32);
        if let Some(format) = response_format {
            builder.response_format(format);
        }
        Ok(builder.build()?)
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String> {
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    /// 看题请求：要求模型只回一个 JSON 对象
    fn interpret_request(&self, page: &RenderedPage) -> Result<CreateChatCompletionRequest> {
        let user_message = self.build_interpret_message(page);
        Self::build_request(
            &self.interpreter_model,
            &user_message,
            Some(INTERPRETER_SYSTEM_PROMPT),
            None,
            Some(ResponseFormat::JsonObject),
        )
    }

    /// 构建看题用的提示词
    fn build_interpret_message(&self, page: &RenderedPage) -> String {
        let links = extract_links(&page.html);
        let link_list = if links.is_empty() {
            "(none)".to_string()
        } else {
            links.join("\n")
        };

        format!(
            r#"Extract the following information from this quiz page:

1. "question": the full task being asked, including any instructions needed to answer it
2. "file_urls": URLs of files that must be downloaded to answer (PDF, CSV, images, ...), or []
3. "submit_url": the endpoint URL where the answer must be POSTed
4. "answer_format": the expected answer type (boolean, number, string, json object, base64, ...)
5. "next_url": the URL of the next quiz if the page names one, otherwise null

Page URL: {}

Page text:
{}

Links found in the page:
{}

Return a JSON object with keys: question, file_urls, submit_url, answer_format, next_url"#,
            page.url,
            truncate_text(&page.text, self.max_file_chars),
            link_list
        )
    }

    /// 构建求解用的提示词和图片列表
    async fn build_solve_message(&self, request: &SolveRequest<'_>) -> (String, Vec<String>) {
        let mut message = format!(
            "Question: {}\n\nProvide only the answer, formatted as {}.",
            request.question,
            format_instruction(request.answer_format)
        );

        let mut images = Vec::new();
        for file in request.files {
            match describe_file(file, self.max_file_chars).await {
                FilePart::Text(text) => {
                    message.push_str("\n\n");
                    message.push_str(&text);
                }
                FilePart::Image(data_url) => {
                    message.push_str(&format!("\n\n[Image attached: {}]", file.url));
                    images.push(data_url);
                }
            }
        }

        if let Some(feedback) = request.feedback {
            message.push_str("\n\n");
            message.push_str(feedback);
            message.push_str("\nTry again and give a different, corrected answer.");
        }

        (message, images)
    }
}

#[async_trait]
impl QuestionInterpreter for LlmService {
    async fn interpret(&self, page: &RenderedPage) -> QuizResult<QuizRecord> {
        let to_error =
            |e: anyhow::Error| QuizError::transport(Stage::Interpret, page.url.as_str(), e);
        let request = self.interpret_request(page).map_err(to_error)?;
        let reply = self.complete(request).await.map_err(to_error)?;

        debug!("题目解析回复: {}", truncate_text(&reply, 300));
        QuizRecord::parse_reply(&reply, &page.url)
    }
}

#[async_trait]
impl AnswerSolver for LlmService {
    async fn solve(&self, request: &SolveRequest<'_>) -> QuizResult<AnswerValue> {
        let (user_message, images) = self.build_solve_message(request).await;
        let reply = self
            .send_to_llm(
                &self.solver_model,
                &user_message,
                Some(SOLVER_SYSTEM_PROMPT),
                Some(&images),
                None,
            )
            .await
            .map_err(|e| QuizError::transport(Stage::Solve, self.solver_model.as_str(), e))?;

        debug!("求解回复: {}", truncate_text(&reply, 300));
        AnswerValue::coerce(&reply, request.answer_format)
    }
}

/// 附件在提示词中的形式
#[derive(Debug, PartialEq)]
enum FilePart {
    Text(String),
    /// data URL
    Image(String),
}

/// 把附件转换成提示词片段
///
/// 文本类内联（截断），图片转 data URL，PDF 和其他二进制只给出名称和大小
async fn describe_file(file: &DownloadedFile, max_chars: usize) -> FilePart {
    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("读取附件失败 {}: {}", file.path.display(), e);
            return FilePart::Text(format!("[File {} could not be read]", file.url));
        }
    };

    let content_type = file.content_type.to_lowercase();
    let extension = file
        .path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if content_type.starts_with("image/") {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        return FilePart::Image(format!("data:{};base64,{}", content_type, encoded));
    }

    if content_type.contains("pdf") || extension == "pdf" {
        return FilePart::Text(format!(
            "[PDF file {} ({} bytes) - analyze the data within]",
            file.url,
            bytes.len()
        ));
    }

    let is_text = content_type.starts_with("text/")
        || ["csv", "json", "xml", "javascript"]
            .iter()
            .any(|k| content_type.contains(k))
        || ["csv", "tsv", "txt", "json", "md", "xml", "html"].contains(&extension.as_str());

    if is_text {
        let text = String::from_utf8_lossy(&bytes);
        return FilePart::Text(format!(
            "File content ({}):\n{}",
            file.url,
            truncate_text(&text, max_chars)
        ));
    }

    FilePart::Text(format!(
        "[Binary file {} ({}, {} bytes) attached]",
        file.url,
        file.content_type,
        bytes.len()
    ))
}

/// 提取页面中的 href / src 链接，去重并保持顺序
fn extract_links(html: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r#"(?i)(?:href|src|action)\s*=\s*["']([^"'#]+)["']"#) else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for cap in re.captures_iter(html) {
        let link = cap[1].trim().to_string();
        if link.is_empty() || link.starts_with("javascript:") || links.contains(&link) {
            continue;
        }
        links.push(link);
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    links
}

fn format_instruction(hint: Option<FormatHint>) -> &'static str {
    match hint.map(|h| h.format) {
        Some(AnswerFormat::Boolean) => "true or false",
        Some(AnswerFormat::Number) => "a single number without units",
        Some(AnswerFormat::Text) => "plain text",
        Some(AnswerFormat::Json) => "a valid JSON value",
        Some(AnswerFormat::Base64) => "a base64 encoded string (or data URI)",
        None => "the most appropriate format",
    }
}
