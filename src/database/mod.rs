// 数据库模块
// 分析结果的审计存储与每日用量统计

pub mod models; // 数据库实体定义
pub mod operations; // 数据库操作实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;

use crate::analysis::model::AnalysisRecord;
use crate::analysis::ports::RecordStore;

pub use operations::{AnalysisOperation, UsageOperation};

/// 持久化错误只记录日志，不返回给用户
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// 基于 Postgres 的记录存储
pub struct PgRecordStore {
    analyses: AnalysisOperation,
    usage: UsageOperation,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            analyses: AnalysisOperation::new(pool.clone()),
            usage: UsageOperation::new(pool),
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn save_analysis(
        &self,
        record: &AnalysisRecord,
        session_id: &str,
    ) -> Result<(), PersistenceError> {
        self.analyses.insert_analysis(record, session_id).await?;
        Ok(())
    }

    async fn record_usage(&self, client_id: &str, date: NaiveDate) -> Result<(), PersistenceError> {
        let usage = self.usage.increment_usage(client_id, date).await?;
        tracing::debug!(
            "Usage for {} on {}: {} requests",
            usage.ip_address,
            usage.date,
            usage.requests_count
        );
        Ok(())
    }
}
