use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// 分析记录数据库实体
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct AnalysisEntity {
    pub id: Uuid,
    pub child_age: i32,
    pub child_age_group: String,
    pub analysis_mode: String,
    pub image_url: String,
    pub analysis_result: Json<serde_json::Value>,
    pub session_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 每日用量统计数据库实体，(ip_address, date) 唯一
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UsageTrackingEntity {
    pub id: Uuid,
    pub ip_address: String,
    pub requests_count: i32,
    pub last_request: chrono::DateTime<chrono::Utc>,
    pub date: chrono::NaiveDate,
}
