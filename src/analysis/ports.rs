//! 编排器依赖的外部协作方

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::model::{AgeGroup, AnalysisMode, AnalysisRecord};
use crate::database::PersistenceError;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision request failed: {0}")]
    Transport(String),

    #[error("vision service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("vision response had no content")]
    EmptyResponse,
}

/// 发送给视觉模型的一次请求
#[derive(Debug, Clone)]
pub struct VisionRequest<'a> {
    pub image_url: &'a str,
    pub child_age: i64,
    pub age_group: AgeGroup,
    pub mode: AnalysisMode,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub max_tokens: u32,
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// 返回模型输出的原始文本，解析由调用方负责
    async fn analyze(&self, request: VisionRequest<'_>) -> Result<String, VisionError>;
}

/// 审计与用量统计的持久化
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save_analysis(
        &self,
        record: &AnalysisRecord,
        session_id: &str,
    ) -> Result<(), PersistenceError>;

    /// 按 (client_id, date) 累加当日请求次数
    async fn record_usage(&self, client_id: &str, date: NaiveDate) -> Result<(), PersistenceError>;
}
