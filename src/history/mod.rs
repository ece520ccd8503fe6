// 会话历史记录
// 最近 10 条分析结果，可保存在本地文件或 Redis 中

pub mod bounded;
pub mod file_store;

use std::sync::Arc;

use redis::Client as RedisClient;
use thiserror::Error;

use crate::analysis::model::AnalysisRecord;
use crate::cache::operations::history::HistoryCacheOperations;
use crate::error::AppError;

pub use bounded::{BoundedHistory, HISTORY_CAPACITY};
pub use file_store::FileHistoryStore;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("history cache error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl From<HistoryError> for AppError {
    fn from(e: HistoryError) -> Self {
        tracing::error!("History store error: {}", e);
        AppError::Internal
    }
}

#[derive(Clone)]
pub enum HistoryStore {
    File(Arc<FileHistoryStore>),
    Redis(Arc<RedisClient>),
}

impl HistoryStore {
    /// 读取会话历史，后端不可用或数据损坏时按空历史处理
    pub async fn load(&self, session_id: &str) -> BoundedHistory {
        match self {
            HistoryStore::File(store) => store.load(session_id).await,
            HistoryStore::Redis(redis) => {
                match HistoryCacheOperations::get_records(redis, session_id).await {
                    Ok(records) => BoundedHistory::from_records(records),
                    Err(e) => {
                        tracing::warn!("Failed to read history for {}: {}", session_id, e);
                        BoundedHistory::new()
                    }
                }
            }
        }
    }

    pub async fn append(&self, session_id: &str, record: AnalysisRecord) -> Result<(), HistoryError> {
        match self {
            HistoryStore::File(store) => store.append(session_id, record).await,
            HistoryStore::Redis(redis) => {
                HistoryCacheOperations::push_record(redis, session_id, &record, HISTORY_CAPACITY)
                    .await
            }
        }
    }

    pub async fn list(&self, session_id: &str) -> Vec<AnalysisRecord> {
        self.load(session_id).await.list()
    }

    pub async fn find_by_id(&self, session_id: &str, id: &str) -> Option<AnalysisRecord> {
        self.load(session_id).await.find_by_id(id).cloned()
    }

    pub async fn remove(&self, session_id: &str, id: &str) -> Result<bool, HistoryError> {
        match self {
            HistoryStore::File(store) => store.remove(session_id, id).await,
            HistoryStore::Redis(redis) => {
                HistoryCacheOperations::remove_record(redis, session_id, id).await
            }
        }
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), HistoryError> {
        match self {
            HistoryStore::File(store) => store.clear(session_id).await,
            HistoryStore::Redis(redis) => {
                HistoryCacheOperations::clear_records(redis, session_id).await
            }
        }
    }
}
