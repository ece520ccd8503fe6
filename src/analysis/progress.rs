use serde::Serialize;

use super::model::{AnalysisRecord, DevelopmentalLevels};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressDirection {
    Improved,
    Declined,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub change: f64,
    pub direction: ProgressDirection,
    pub percentage: u32,
}

fn average_points(levels: &DevelopmentalLevels) -> f64 {
    let all = levels.all();
    let total: u32 = all.iter().map(|level| level.points()).sum();
    f64::from(total) / all.len() as f64
}

/// 比较同龄的两次分析，按五个维度的平均得分计算变化
pub fn calculate_progress(current: &AnalysisRecord, previous: &AnalysisRecord) -> Progress {
    let current_avg = average_points(&current.developmental_levels);
    let previous_avg = average_points(&previous.developmental_levels);
    let change = current_avg - previous_avg;

    let direction = if change > f64::EPSILON {
        ProgressDirection::Improved
    } else if change < -f64::EPSILON {
        ProgressDirection::Declined
    } else {
        ProgressDirection::Stable
    };

    Progress {
        change,
        direction,
        percentage: (change.abs() / previous_avg * 100.0).round() as u32,
    }
}
