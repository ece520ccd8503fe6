//! 按年龄段和分析方式选择提示词模板
//!
//! 模板是静态数据，查表即可，不做分支拼装。

use thiserror::Error;

use super::model::{AgeGroup, AnalysisMode};
use crate::error::AppError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unsupported prompt combination: {age_group} / {mode}")]
    UnsupportedCombination { age_group: String, mode: String },
}

impl From<PromptError> for AppError {
    fn from(_: PromptError) -> Self {
        AppError::UnsupportedCombination
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    pub age_group: AgeGroup,
    pub mode: AnalysisMode,
    pub system: &'static str,
    pub user: &'static str,
    pub max_tokens: u32,
}

const SYSTEM_DEEP: &str = include_str!("prompts/system_deep.txt");
const SYSTEM_SIMPLE: &str = include_str!("prompts/system_simple.txt");

const DEEP_MAX_TOKENS: u32 = 4000;
const SIMPLE_MAX_TOKENS: u32 = 1500;

static PROMPT_TABLE: [PromptTemplate; 6] = [
    PromptTemplate {
        age_group: AgeGroup::Infant,
        mode: AnalysisMode::Deep,
        system: SYSTEM_DEEP,
        user: include_str!("prompts/infant_deep.txt"),
        max_tokens: DEEP_MAX_TOKENS,
    },
    PromptTemplate {
        age_group: AgeGroup::Infant,
        mode: AnalysisMode::Simple,
        system: SYSTEM_SIMPLE,
        user: include_str!("prompts/infant_simple.txt"),
        max_tokens: SIMPLE_MAX_TOKENS,
    },
    PromptTemplate {
        age_group: AgeGroup::Child,
        mode: AnalysisMode::Deep,
        system: SYSTEM_DEEP,
        user: include_str!("prompts/child_deep.txt"),
        max_tokens: DEEP_MAX_TOKENS,
    },
    PromptTemplate {
        age_group: AgeGroup::Child,
        mode: AnalysisMode::Simple,
        system: SYSTEM_SIMPLE,
        user: include_str!("prompts/child_simple.txt"),
        max_tokens: SIMPLE_MAX_TOKENS,
    },
    PromptTemplate {
        age_group: AgeGroup::Elementary,
        mode: AnalysisMode::Deep,
        system: SYSTEM_DEEP,
        user: include_str!("prompts/elementary_deep.txt"),
        max_tokens: DEEP_MAX_TOKENS,
    },
    PromptTemplate {
        age_group: AgeGroup::Elementary,
        mode: AnalysisMode::Simple,
        system: SYSTEM_SIMPLE,
        user: include_str!("prompts/elementary_simple.txt"),
        max_tokens: SIMPLE_MAX_TOKENS,
    },
];

pub fn select_prompt(
    age_group: AgeGroup,
    mode: AnalysisMode,
) -> Result<&'static PromptTemplate, PromptError> {
    PROMPT_TABLE
        .iter()
        .find(|template| template.age_group == age_group && template.mode == mode)
        .ok_or_else(|| PromptError::UnsupportedCombination {
            age_group: age_group.to_string(),
            mode: mode.as_str().to_string(),
        })
}

/// 年龄段以字符串给出时使用，未知年龄段返回错误
pub fn select_prompt_by_name(
    age_group: &str,
    mode: AnalysisMode,
) -> Result<&'static PromptTemplate, PromptError> {
    let group = age_group
        .parse::<AgeGroup>()
        .map_err(|unknown| PromptError::UnsupportedCombination {
            age_group: unknown,
            mode: mode.as_str().to_string(),
        })?;
    select_prompt(group, mode)
}
