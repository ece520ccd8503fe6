//! 宽松解析模型输出
//!
//! 模型返回的文本格式没有保证：可能带有代码块或前后说明，字段也可能缺失或类型不符。
//! 这里只要求能找到一个 JSON 对象，其余字段缺失时使用默认值。

use serde_json::{Map, Value};
use thiserror::Error;

use super::model::{ActionPlan, DevelopmentalLevel, DevelopmentalLevels, Insights};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
}

/// 模型给出的分析内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisPayload {
    pub image_description: String,
    pub insights: Insights,
    pub recommendations: Vec<String>,
    pub strengths: Vec<String>,
    pub areas_for_growth: Vec<String>,
    pub parental_guidance: String,
    pub action_plan: ActionPlan,
    pub developmental_levels: DevelopmentalLevels,
    pub red_flags: Option<Vec<String>>,
    pub professional_consultation: Option<String>,
}

/// 取出文本中第一个完整的顶层 JSON 对象
///
/// 只尝试位于最外层的 `{`，被截断的对象不会退化成它内部的子对象。
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    for start in top_level_starts(text) {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(object))) = stream.next() {
            return Some(object);
        }
    }

    // 兜底：第一个 '{' 到最后一个 '}' 之间的内容
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

// 按括号深度扫描，返回所有深度为 0 的 `{` 的位置；对象内部的字符串字面量不计入深度
fn top_level_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '{' => {
                if depth == 0 {
                    starts.push(index);
                }
                depth += 1;
            }
            '}' if depth > 0 => depth -= 1,
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }

    starts
}

pub fn parse_analysis(text: &str) -> Result<AnalysisPayload, ParseError> {
    let object = extract_json_object(text).ok_or(ParseError::NoJsonObject)?;
    Ok(payload_from_object(&object))
}

fn payload_from_object(object: &Map<String, Value>) -> AnalysisPayload {
    let insights = object.get("insights").and_then(Value::as_object);
    let action_plan = object.get("actionPlan").and_then(Value::as_object);
    let levels = object.get("developmentalLevels").and_then(Value::as_object);

    let insight = |key: &str| insights.map(|map| string_field(map, key)).unwrap_or_default();
    let plan = |key: &str| action_plan.map(|map| string_list(map, key)).unwrap_or_default();
    let level = |key: &str| {
        levels
            .and_then(|map| map.get(key))
            .and_then(Value::as_str)
            .map(DevelopmentalLevel::parse_lenient)
            .unwrap_or_default()
    };

    let red_flags = match object.get("redFlags") {
        None | Some(Value::Null) => None,
        Some(_) => Some(string_list(object, "redFlags")),
    };
    let professional_consultation = Some(string_field(object, "professionalConsultation"))
        .filter(|text| !text.trim().is_empty());

    AnalysisPayload {
        image_description: string_field(object, "imageDescription"),
        insights: Insights {
            emotional: insight("emotional"),
            cognitive: insight("cognitive"),
            creative: insight("creative"),
            developmental: insight("developmental"),
            social: insight("social"),
            drawing_elements: insight("drawingElements"),
            self_concept: insight("selfConcept"),
            physical: insight("physical"),
        },
        recommendations: string_list(object, "recommendations"),
        strengths: string_list(object, "strengths"),
        areas_for_growth: string_list(object, "areasForGrowth"),
        parental_guidance: string_field(object, "parentalGuidance"),
        action_plan: ActionPlan {
            immediate: plan("immediate"),
            short_term: plan("shortTerm"),
            long_term: plan("longTerm"),
        },
        developmental_levels: DevelopmentalLevels {
            emotional: level("emotional"),
            cognitive: level("cognitive"),
            creative: level("creative"),
            social: level("social"),
            physical: level("physical"),
        },
        red_flags,
        professional_consultation,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

// 期望是字符串数组；单个字符串视为只有一项
fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .filter(|item| !item.trim().is_empty())
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_fenced_response() {
        let text = r#"분석 결과입니다.
```json
{"insights": {"emotional": "밝은 색을 많이 썼어요"}, "strengths": ["색 사용"]}
```"#;

        let payload = parse_analysis(text).unwrap();
        assert_eq!(payload.insights.emotional, "밝은 색을 많이 썼어요");
        assert_eq!(payload.strengths, vec!["색 사용".to_string()]);
    }

    #[test]
    fn takes_the_first_complete_object() {
        let text = r#"{"parentalGuidance": "first"} and later {"parentalGuidance": "second"}"#;
        assert_eq!(parse_analysis(text).unwrap().parental_guidance, "first");
    }

    #[test]
    fn skips_braces_that_do_not_start_an_object() {
        let text = r#"note {not json} then {"strengths": ["집중력"]}"#;
        assert_eq!(
            parse_analysis(text).unwrap().strengths,
            vec!["집중력".to_string()]
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let payload = parse_analysis(r#"{"developmentalLevels": {"creative": "above"}}"#).unwrap();

        assert!(payload.recommendations.is_empty());
        assert!(payload.action_plan.immediate.is_empty());
        assert_eq!(payload.parental_guidance, "");
        assert_eq!(
            payload.developmental_levels.creative,
            DevelopmentalLevel::Above
        );
        assert_eq!(
            payload.developmental_levels.social,
            DevelopmentalLevel::Average
        );
        assert!(payload.red_flags.is_none());
        assert!(payload.professional_consultation.is_none());
    }

    #[test]
    fn mistyped_fields_are_tolerated() {
        let payload = parse_analysis(
            r#"{
                "strengths": "하나뿐인 강점",
                "recommendations": ["그림책 읽기", 3, null, ""],
                "insights": "not an object",
                "developmentalLevels": {"emotional": 2},
                "redFlags": []
            }"#,
        )
        .unwrap();

        assert_eq!(payload.strengths, vec!["하나뿐인 강점".to_string()]);
        assert_eq!(payload.recommendations, vec!["그림책 읽기".to_string()]);
        assert_eq!(payload.insights, Insights::default());
        assert_eq!(
            payload.developmental_levels.emotional,
            DevelopmentalLevel::Average
        );
        assert_eq!(payload.red_flags, Some(vec![]));
    }

    #[test]
    fn truncated_output_is_an_error() {
        let text = r#"{"imageDescription": "집", "insights": {"emotional": "밝아요", "cognitive": "좋아요"}, "strengths": ["색"#;
        assert_eq!(parse_analysis(text), Err(ParseError::NoJsonObject));

        let fenced = format!("```json\n{text}");
        assert_eq!(parse_analysis(&fenced), Err(ParseError::NoJsonObject));
    }

    #[test]
    fn braces_inside_strings_do_not_split_the_object() {
        let text = r#"결과: {"parentalGuidance": "괄호 } 와 { 도 괜찮아요", "strengths": ["선 \"곧게\" 긋기"]}"#;
        let payload = parse_analysis(text).unwrap();
        assert_eq!(payload.parental_guidance, "괄호 } 와 { 도 괜찮아요");
        assert_eq!(payload.strengths, vec!["선 \"곧게\" 긋기".to_string()]);
    }

    #[test]
    fn text_without_an_object_is_an_error() {
        assert_eq!(
            parse_analysis("죄송합니다. 분석할 수 없습니다."),
            Err(ParseError::NoJsonObject)
        );
        assert_eq!(parse_analysis("[1, 2, 3]"), Err(ParseError::NoJsonObject));
    }
}
