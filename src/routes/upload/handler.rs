use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    infrastructure::blob::{blob_pathname, schedule_deletion},
    utils::{messages, success_to_api_response},
};

use super::model::{ALLOWED_CONTENT_TYPES, UploadResponse};

struct UploadedFile {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// 读取 `file` 字段，其余字段忽略
async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AppError::Validation(messages::MISSING_FILE.into())),
            Err(e) => return Err(multipart_error(e.status(), &e.body_text())),
        };

        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("drawing").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), &e.body_text()))?;

        return Ok(UploadedFile {
            name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

fn multipart_error(status: StatusCode, detail: &str) -> AppError {
    tracing::debug!("Multipart error ({}): {}", status, detail);
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation(messages::FILE_TOO_LARGE.into())
    } else {
        AppError::Validation(messages::MISSING_FILE.into())
    }
}

/// 上传图片到对象存储，并在保留期后删除
#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected upload body: {}", e);
        AppError::Validation(messages::MISSING_FILE.into())
    })?;

    let file = read_file_field(multipart).await?;

    if file.bytes.is_empty() {
        return Err(AppError::Validation(messages::MISSING_FILE.into()));
    }
    if file.bytes.len() > state.config.upload_max_bytes {
        return Err(AppError::Validation(messages::FILE_TOO_LARGE.into()));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&file.content_type.as_str()) {
        return Err(AppError::Validation(messages::INVALID_FILE_TYPE.into()));
    }

    let size = file.bytes.len();
    let pathname = blob_pathname(&file.name, chrono::Utc::now().timestamp_millis());

    tracing::info!("Uploading {} ({} bytes)", pathname, size);
    let blob = state
        .blobs
        .upload(&pathname, file.bytes, &file.content_type)
        .await
        .map_err(|e| {
            tracing::error!("Blob upload failed: {}", e);
            AppError::UploadFailed(messages::UPLOAD_FAILED.into())
        })?;

    schedule_deletion(
        state.blobs.clone(),
        blob.url.clone(),
        state.config.image_retention(),
    );

    Ok(success_to_api_response(UploadResponse {
        url: blob.url,
        public_id: pathname,
        filename: file.name,
        size,
        content_type: file.content_type,
        storage: "vercel-blob",
    }))
}
