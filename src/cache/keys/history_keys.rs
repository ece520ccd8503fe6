/// 会话历史缓存键前缀
const HISTORY_PREFIX: &str = "history:";

/// 生成会话历史列表键
pub fn history_key(session_id: &str) -> String {
    format!("{}{}", HISTORY_PREFIX, session_id)
}
