use axum::Json;
use serde::{Deserialize, Serialize};

/// 统一响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 稳定的机器可读错误类型，仅失败时出现
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        code: None,
    })
}

pub fn error_to_api_response<T>(code: &str, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: false,
        data: None,
        error: Some(msg),
        code: Some(code.to_string()),
    })
}

pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";
    pub const ANALYSIS_FAILED: &str = "ANALYSIS_FAILED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const UNSUPPORTED_COMBINATION: &str = "UNSUPPORTED_COMBINATION";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// 用户可见的提示文案
pub mod messages {
    pub const FILE_TOO_LARGE: &str =
        "파일 크기가 너무 큽니다. 10MB 이하의 파일을 업로드해주세요.";
    pub const INVALID_FILE_TYPE: &str =
        "지원하지 않는 파일 형식입니다. JPG, PNG, WEBP 파일만 업로드 가능합니다.";
    pub const MISSING_FILE: &str = "파일이 제공되지 않았습니다.";
    pub const RATE_LIMIT_EXCEEDED: &str = "요청 한도를 초과했습니다. 잠시 후 다시 시도해주세요.";
    pub const ANALYSIS_FAILED: &str =
        "AI 분석 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";
    pub const ANALYSIS_TIMEOUT: &str = "분석 시간이 초과되었습니다. 다시 시도해주세요.";
    pub const INVALID_AGE: &str = "연령을 올바르게 입력해주세요. (2-12세)";
    pub const MISSING_FIELDS: &str = "필수 정보가 누락되었습니다.";
    pub const INVALID_IMAGE_URL: &str = "이미지 주소가 올바르지 않습니다.";
    pub const INVALID_MODE: &str = "지원하지 않는 분석 방식입니다. (deep, simple)";
    pub const UPLOAD_FAILED: &str = "파일 업로드에 실패했습니다. 다시 시도해주세요.";
    pub const MISSING_SESSION: &str = "세션 정보가 없습니다.";
    pub const ANALYSIS_NOT_FOUND: &str = "분석 기록을 찾을 수 없습니다.";
    pub const UNSUPPORTED_AGE_GROUP: &str = "지원하지 않는 연령대입니다.";
    pub const INTERNAL_ERROR: &str = "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";
}
