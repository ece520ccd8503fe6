use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::utils::messages;

/// 年龄段，由年龄唯一确定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Infant,
    Child,
    Elementary,
}

pub const MIN_AGE: i64 = 2;
pub const MAX_AGE: i64 = 12;

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Infant, AgeGroup::Child, AgeGroup::Elementary];

    /// 2-4 → infant, 5-7 → child, 8-12 → elementary
    pub fn from_age(age: i64) -> Result<Self, AppError> {
        match age {
            MIN_AGE..=4 => Ok(AgeGroup::Infant),
            5..=7 => Ok(AgeGroup::Child),
            8..=MAX_AGE => Ok(AgeGroup::Elementary),
            _ => Err(AppError::Validation(messages::INVALID_AGE.into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Infant => "infant",
            AgeGroup::Child => "child",
            AgeGroup::Elementary => "elementary",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Infant => "영유아 (2-4세)",
            AgeGroup::Child => "아동 (5-7세)",
            AgeGroup::Elementary => "초등학생 (8-12세)",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "infant" => Ok(AgeGroup::Infant),
            "child" => Ok(AgeGroup::Child),
            "elementary" => Ok(AgeGroup::Elementary),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Deep,
    Simple,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Deep => "deep",
            AnalysisMode::Simple => "simple",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deep" => Ok(AnalysisMode::Deep),
            "simple" => Ok(AnalysisMode::Simple),
            _ => Err(AppError::Validation(messages::INVALID_MODE.into())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentalLevel {
    Below,
    #[default]
    Average,
    Above,
}

impl DevelopmentalLevel {
    /// 无法识别的取值一律视为 average
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "below" => DevelopmentalLevel::Below,
            "above" => DevelopmentalLevel::Above,
            _ => DevelopmentalLevel::Average,
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            DevelopmentalLevel::Below => 1,
            DevelopmentalLevel::Average => 2,
            DevelopmentalLevel::Above => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Insights {
    pub emotional: String,
    pub cognitive: String,
    pub creative: String,
    pub developmental: String,
    pub social: String,
    pub drawing_elements: String,
    pub self_concept: String,
    pub physical: String,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        [
            &self.emotional,
            &self.cognitive,
            &self.creative,
            &self.developmental,
            &self.social,
            &self.drawing_elements,
            &self.self_concept,
            &self.physical,
        ]
        .iter()
        .all(|text| text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionPlan {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentalLevels {
    pub emotional: DevelopmentalLevel,
    pub cognitive: DevelopmentalLevel,
    pub creative: DevelopmentalLevel,
    pub social: DevelopmentalLevel,
    pub physical: DevelopmentalLevel,
}

impl DevelopmentalLevels {
    pub fn all(&self) -> [DevelopmentalLevel; 5] {
        [
            self.emotional,
            self.cognitive,
            self.creative,
            self.social,
            self.physical,
        ]
    }
}

/// 一次分析的完整结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub child_age: i64,
    pub age_group: AgeGroup,
    pub image_url: String,
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
    #[serde(default)]
    pub image_description: String,
    #[serde(default)]
    pub insights: Insights,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_growth: Vec<String>,
    #[serde(default)]
    pub parental_guidance: String,
    #[serde(default)]
    pub action_plan: ActionPlan,
    #[serde(default)]
    pub developmental_levels: DevelopmentalLevels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_consultation: Option<String>,
    pub created_at: DateTime<Utc>,
}
