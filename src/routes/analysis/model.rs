use serde::Deserialize;
use serde_json::Value;

use crate::analysis::service::AnalysisInput;

/// 分析请求体，字段都允许缺失，由编排器统一校验
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_url: Option<String>,
    pub child_age: Option<Value>,
    pub analysis_mode: Option<String>,
}

impl AnalyzeRequest {
    /// 年龄可能以数字或数字字符串传入
    fn child_age(&self) -> Option<i64> {
        match self.child_age.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn into_input(self) -> AnalysisInput {
        AnalysisInput {
            child_age: self.child_age(),
            image_url: self.image_url,
            analysis_mode: self.analysis_mode,
        }
    }
}
