use serde::Serialize;

use crate::analysis::{model::AnalysisRecord, progress::Progress};

#[derive(Debug, Serialize)]
pub struct ComparisonResponse {
    pub previous: AnalysisRecord,
    pub progress: Progress,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}
