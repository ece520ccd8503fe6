/// 缓存操作
/// 提供缓存操作的功能实现

// 会话历史缓存操作
pub mod history;

pub use history::HistoryCacheOperations;
