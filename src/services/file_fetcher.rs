//! 附件下载服务 - 业务能力层

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::capabilities::FileFetcher;
use crate::error::{QuizError, QuizResult, Stage};
use crate::models::DownloadedFile;
use crate::utils::text::file_name_from_url;

/// 通过 HTTP GET 下载附件
///
/// 超时由编排层控制，这里不单独设置
pub struct HttpFileFetcher {
    client: reqwest::Client,
    /// 文件名前缀序号，避免同名附件互相覆盖
    counter: AtomicUsize,
}

impl HttpFileFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> QuizResult<DownloadedFile> {
        debug!("下载附件: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| QuizError::transport(Stage::Fetch, url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::transport(
                Stage::Fetch,
                url.as_str(),
                format!("HTTP 状态码 {}", status),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| QuizError::transport(Stage::Fetch, url.as_str(), e))?;

        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = dest_dir.join(file_name_from_url(url, index));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| QuizError::transport(Stage::Fetch, url.as_str(), format!("写入文件失败: {}", e)))?;

        Ok(DownloadedFile {
            url: url.clone(),
            path,
            content_type,
            size: bytes.len() as u64,
        })
    }
}
