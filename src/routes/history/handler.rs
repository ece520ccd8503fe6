use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    analysis::progress::calculate_progress,
    error::AppError,
    middleware::SessionId,
    utils::{messages, success_to_api_response},
};

use super::model::{ComparisonResponse, RemoveResponse};

fn require_session(SessionId(session): SessionId) -> Result<String, AppError> {
    session.ok_or_else(|| AppError::Validation(messages::MISSING_SESSION.into()))
}

/// 当前会话的分析历史，新记录在前
pub async fn list_history(
    State(state): State<AppState>,
    session: SessionId,
) -> Result<impl IntoResponse, AppError> {
    let session_id = require_session(session)?;
    let records = state.history.list(&session_id).await;
    Ok(success_to_api_response(records))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    session: SessionId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = require_session(session)?;
    let record = state
        .history
        .find_by_id(&session_id, &id)
        .await
        .ok_or_else(|| AppError::NotFound(messages::ANALYSIS_NOT_FOUND.into()))?;
    Ok(success_to_api_response(record))
}

/// 删除单条记录，记录不存在时同样返回成功
pub async fn delete_analysis(
    State(state): State<AppState>,
    session: SessionId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = require_session(session)?;
    let removed = state.history.remove(&session_id, &id).await?;
    Ok(success_to_api_response(RemoveResponse { removed }))
}

pub async fn clear_history(
    State(state): State<AppState>,
    session: SessionId,
) -> Result<impl IntoResponse, AppError> {
    let session_id = require_session(session)?;
    state.history.clear(&session_id).await?;
    tracing::info!("Cleared history for session {}", session_id);
    Ok(success_to_api_response(RemoveResponse { removed: true }))
}

/// 与同龄的上一次分析比较，没有可比较的记录时 data 为 null
pub async fn compare_with_previous(
    State(state): State<AppState>,
    session: SessionId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = require_session(session)?;
    let history = state.history.load(&session_id).await;

    let current = history
        .find_by_id(&id)
        .ok_or_else(|| AppError::NotFound(messages::ANALYSIS_NOT_FOUND.into()))?;

    let comparison = history
        .find_most_recent_by_age(current.child_age, Some(id.as_str()))
        .map(|previous| ComparisonResponse {
            progress: calculate_progress(current, previous),
            previous: previous.clone(),
        });

    Ok(success_to_api_response(comparison))
}
