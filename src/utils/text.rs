//! LLM 回复文本的清洗工具

use url::Url;

/// 去掉 markdown 代码块包裹（```json ... ```）
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标记所在的第一行
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// 从回复中截取第一个完整的 JSON 对象
///
/// 按括号深度匹配，字符串里的括号不计数
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 把可能是相对路径的链接解析成绝对 http(s) URL
pub fn resolve_http_url(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// 把 URL 的最后一段转成安全的本地文件名
pub fn file_name_from_url(url: &Url, fallback_index: usize) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned.is_empty() {
        format!("file_{}", fallback_index)
    } else {
        format!("{}_{}", fallback_index, cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  42  "), "42");
        assert_eq!(strip_code_fence("```\nhello\n```"), "hello");
    }

    #[test]
    fn test_extract_json_object_skips_prose_and_string_braces() {
        let reply = "Sure! Here it is: {\"question\": \"what is {x}?\", \"n\": {\"k\": 1}} hope it helps";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"question\": \"what is {x}?\", \"n\": {\"k\": 1}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
    }

    #[test]
    fn test_resolve_http_url() {
        let base = Url::parse("https://quiz.example.com/demo/q1").unwrap();
        assert_eq!(
            resolve_http_url(&base, "/submit").unwrap().as_str(),
            "https://quiz.example.com/submit"
        );
        assert_eq!(
            resolve_http_url(&base, "data.csv").unwrap().as_str(),
            "https://quiz.example.com/demo/data.csv"
        );
        assert!(resolve_http_url(&base, "mailto:a@b.c").is_none());
        assert!(resolve_http_url(&base, "  ").is_none());
    }

    #[test]
    fn test_file_name_from_url() {
        let url = Url::parse("https://x.com/files/report%20final.pdf?x=1").unwrap();
        assert_eq!(file_name_from_url(&url, 0), "0_report_20final.pdf");
        let bare = Url::parse("https://x.com/").unwrap();
        assert_eq!(file_name_from_url(&bare, 3), "file_3");
    }
}
