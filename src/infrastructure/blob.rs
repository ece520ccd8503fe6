use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob request failed: {0}")]
    Transport(String),

    #[error("blob service returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub url: String,
    pub pathname: String,
}

/// 图片存储
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredBlob, BlobError>;

    async fn delete(&self, url: &str) -> Result<(), BlobError>;
}

/// 生成上传路径：`artanalyx/artwork_{毫秒时间戳}_{清洗后的文件名}`
pub fn blob_pathname(file_name: &str, timestamp_millis: i64) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("artanalyx/artwork_{}_{}", timestamp_millis, sanitized)
}

/// 保留期满后删除图片，失败只记录日志
pub fn schedule_deletion(storage: Arc<dyn BlobStorage>, url: String, retention: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        match storage.delete(&url).await {
            Ok(()) => tracing::info!("Scheduled deletion completed: {}", url),
            Err(e) => tracing::error!("Scheduled deletion failed for {}: {}", url, e),
        }
    });
}

/// Vercel Blob REST 接口
pub struct VercelBlobStorage {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    urls: [&'a str; 1],
}

impl VercelBlobStorage {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_url: config.blob_api_url.trim_end_matches('/').to_string(),
            token: config.blob_token.clone(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BlobError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BlobError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BlobStorage for VercelBlobStorage {
    async fn upload(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let response = self
            .http
            .put(format!("{}/{}", self.api_url, pathname))
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .body(bytes)
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        let blob: StoredBlob = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        tracing::info!("Image uploaded to blob storage: {}", blob.url);
        Ok(blob)
    }

    async fn delete(&self, url: &str) -> Result<(), BlobError> {
        let response = self
            .http
            .post(format!("{}/delete", self.api_url))
            .bearer_auth(&self.token)
            .json(&DeleteRequest { urls: [url] })
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}
