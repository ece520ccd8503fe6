use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response, messages};

/// 写入响应扩展的错误类型，供日志中间件读取
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

/// 对外暴露的错误类型，消息可直接展示给用户
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", messages::RATE_LIMIT_EXCEEDED)]
    RateLimitExceeded,

    #[error("{0}")]
    UploadFailed(String),

    #[error("{0}")]
    AnalysisFailed(String),

    #[error("{}", messages::ANALYSIS_TIMEOUT)]
    Timeout,

    #[error("{}", messages::UNSUPPORTED_AGE_GROUP)]
    UnsupportedCombination,

    #[error("{0}")]
    NotFound(String),

    #[error("{}", messages::INTERNAL_ERROR)]
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::RateLimitExceeded => error_codes::RATE_LIMIT_EXCEEDED,
            AppError::UploadFailed(_) => error_codes::UPLOAD_FAILED,
            AppError::AnalysisFailed(_) => error_codes::ANALYSIS_FAILED,
            AppError::Timeout => error_codes::TIMEOUT,
            AppError::UnsupportedCombination => error_codes::UNSUPPORTED_COMBINATION,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::Internal => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::UploadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::AnalysisFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::UnsupportedCombination => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = error_to_api_response::<()>(self.code(), self.to_string());
        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorCode(self.code()));

        if matches!(self, AppError::RateLimitExceeded) {
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}
