use axum::{
    extract::{Json, State, rejection::JsonRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    analysis::service::RequestContext,
    error::AppError,
    middleware::{ClientIp, SESSION_HEADER, SessionId},
    utils::{messages, success_to_api_response},
};

use super::model::AnalyzeRequest;

/// 分析上传的图片
#[axum::debug_handler]
pub async fn analyze(
    State(state): State<AppState>,
    ClientIp(client_id): ClientIp,
    SessionId(session_id): SessionId,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!("Rejected analyze body: {}", e);
        AppError::Validation(messages::MISSING_FIELDS.into())
    })?;

    // 没有会话时生成一个，并通过响应头回传给客户端
    let context = RequestContext {
        client_id,
        session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    };

    let outcome = state.analysis.analyze(&context, req.into_input()).await?;

    Ok((
        [
            ("x-ratelimit-remaining", outcome.remaining.to_string()),
            (SESSION_HEADER, context.session_id),
        ],
        success_to_api_response(outcome.record),
    ))
}
