// 缓存模块
// 包含缓存键和操作逻辑

pub mod keys;
pub mod operations;

pub use operations::HistoryCacheOperations;
