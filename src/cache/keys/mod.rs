/// 缓存键模块
/// 提供各种缓存键生成函数

// 会话历史缓存键模块
pub mod history_keys;

pub use history_keys::history_key;
