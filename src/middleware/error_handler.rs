use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::error::ErrorCode;

/// 记录失败请求
///
/// `AppError` 会把错误类型放进响应扩展，这里直接读取，不需要缓冲响应体。
/// 5xx 记为 error，429 记为 warn，其余 4xx 只在 debug 级别出现。
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    if status.is_success() || status.is_redirection() || status.is_informational() {
        return response;
    }

    let code = response
        .extensions()
        .get::<ErrorCode>()
        .map_or("UNCLASSIFIED", |code| code.0);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(%method, %path, %status, code, elapsed_ms, "Request failed");
    } else if status.as_u16() == 429 {
        tracing::warn!(%method, %path, code, "Request rate limited");
    } else {
        tracing::debug!(%method, %path, %status, code, "Request rejected");
    }

    response
}
