// 数据库实体定义
pub mod analysis;

pub use analysis::{AnalysisEntity, UsageTrackingEntity};
