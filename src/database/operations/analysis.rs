// 分析记录存储
// 包含分析结果和用量统计的数据库操作

use crate::analysis::model::AnalysisRecord;
use crate::database::models::analysis::{AnalysisEntity, UsageTrackingEntity};
use sqlx::types::Json;
use sqlx::{Error as SqlxError, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// 分析记录存储库
pub struct AnalysisOperation {
    db: Arc<PgPool>,
}

impl AnalysisOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    /// 保存一次分析结果，返回写入的记录
    pub async fn insert_analysis(
        &self,
        record: &AnalysisRecord,
        session_id: &str,
    ) -> Result<AnalysisEntity, SqlxError> {
        let id = Uuid::parse_str(&record.id).unwrap_or_else(|_| Uuid::new_v4());
        let payload = serde_json::to_value(record)
            .map_err(|e| SqlxError::Protocol(format!("Failed to encode analysis: {}", e)))?;

        let entity = sqlx::query_as::<_, AnalysisEntity>(
            r#"
            INSERT INTO analyses
                (id, child_age, child_age_group, analysis_mode, image_url, analysis_result, session_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, child_age, child_age_group, analysis_mode, image_url, analysis_result, session_id, created_at
            "#,
        )
        .bind(id)
        .bind(record.child_age as i32)
        .bind(record.age_group.as_str())
        .bind(record.analysis_mode.as_str())
        .bind(&record.image_url)
        .bind(Json(payload))
        .bind(session_id)
        .bind(record.created_at)
        .fetch_one(&*self.db)
        .await?;

        tracing::debug!("Stored analysis {} for session {}", entity.id, session_id);
        Ok(entity)
    }
}

/// 用量统计存储库
pub struct UsageOperation {
    db: Arc<PgPool>,
}

impl UsageOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    /// 当日首次请求时插入，之后累加计数
    pub async fn increment_usage(
        &self,
        ip_address: &str,
        date: chrono::NaiveDate,
    ) -> Result<UsageTrackingEntity, SqlxError> {
        let usage = sqlx::query_as::<_, UsageTrackingEntity>(
            r#"
            INSERT INTO usage_tracking (id, ip_address, requests_count, last_request, date)
            VALUES ($1, $2, 1, NOW(), $3)
            ON CONFLICT (ip_address, date) DO UPDATE
            SET requests_count = usage_tracking.requests_count + 1,
                last_request = NOW()
            RETURNING id, ip_address, requests_count, last_request, date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ip_address)
        .bind(date)
        .fetch_one(&*self.db)
        .await?;

        Ok(usage)
    }
}
