use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::analysis::model::AnalysisRecord;

pub const HISTORY_CAPACITY: usize = 10;

/// 最近 N 条分析记录，新记录在前
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundedHistory {
    records: VecDeque<AnalysisRecord>,
}

impl BoundedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按新到旧的顺序载入，超出容量的部分丢弃
    pub fn from_records(records: impl IntoIterator<Item = AnalysisRecord>) -> Self {
        Self {
            records: records.into_iter().take(HISTORY_CAPACITY).collect(),
        }
    }

    pub fn append(&mut self, record: AnalysisRecord) {
        self.records.push_front(record);
        self.records.truncate(HISTORY_CAPACITY);
    }

    pub fn list(&self) -> Vec<AnalysisRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&AnalysisRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// 删除对应记录，返回是否存在
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        self.records.len() != before
    }

    pub fn find_most_recent_by_age(
        &self,
        age: i64,
        exclude_id: Option<&str>,
    ) -> Option<&AnalysisRecord> {
        self.records
            .iter()
            .find(|record| record.child_age == age && Some(record.id.as_str()) != exclude_id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
