// 数据库操作实现
pub mod analysis;

pub use analysis::{AnalysisOperation, UsageOperation};
