use std::sync::Arc;
use redis::{AsyncCommands, Client as RedisClient};

use crate::analysis::model::AnalysisRecord;
use crate::cache::keys::history_key;
use crate::history::HistoryError;

/// 会话历史缓存操作
///
/// 每个会话对应一个 Redis 列表，新记录在表头。
pub struct HistoryCacheOperations;

impl HistoryCacheOperations {
    /// 写入表头并裁剪到容量，两步在同一个事务中完成
    pub async fn push_record(
        redis: &Arc<RedisClient>,
        session_id: &str,
        record: &AnalysisRecord,
        capacity: usize,
    ) -> Result<(), HistoryError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;

        let key = history_key(session_id);
        let json = serde_json::to_string(record)?;
        let stop = capacity.saturating_sub(1) as isize;

        let _: () = redis::pipe()
            .atomic()
            .lpush(&key, json)
            .ignore()
            .ltrim(&key, 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    /// 读取会话的全部记录，无法解析的条目跳过
    pub async fn get_records(
        redis: &Arc<RedisClient>,
        session_id: &str,
    ) -> Result<Vec<AnalysisRecord>, HistoryError> {
        let raw = Self::get_raw(redis, session_id).await?;
        Ok(raw
            .iter()
            .filter_map(|json| match serde_json::from_str::<AnalysisRecord>(json) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping corrupted history entry for {}: {}", session_id, e);
                    None
                }
            })
            .collect())
    }

    /// 删除指定记录
    pub async fn remove_record(
        redis: &Arc<RedisClient>,
        session_id: &str,
        id: &str,
    ) -> Result<bool, HistoryError> {
        let raw = Self::get_raw(redis, session_id).await?;
        let target = raw.into_iter().find(|json| {
            serde_json::from_str::<AnalysisRecord>(json)
                .map(|record| record.id == id)
                .unwrap_or(false)
        });

        match target {
            Some(json) => {
                let mut conn = redis.get_multiplexed_async_connection().await?;
                let removed: i64 = conn.lrem(history_key(session_id), 0, json).await?;
                Ok(removed > 0)
            }
            None => Ok(false),
        }
    }

    /// 清空会话历史
    pub async fn clear_records(
        redis: &Arc<RedisClient>,
        session_id: &str,
    ) -> Result<(), HistoryError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(history_key(session_id)).await?;
        Ok(())
    }

    async fn get_raw(
        redis: &Arc<RedisClient>,
        session_id: &str,
    ) -> Result<Vec<String>, HistoryError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let raw: Vec<String> = conn.lrange(history_key(session_id), 0, -1).await?;
        Ok(raw)
    }
}
