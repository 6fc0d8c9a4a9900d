use crate::error::ApiError;
use crate::response::{DetectResponse, HealthResponse, ModelInfoResponse};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Multipart, State},
};

const UPLOAD_FIELD: &str = "file";

pub async fn root() -> &'static str {
    "Pothole detection service. POST an image to /detect."
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let meta = state.service.model_metadata().await?;
    Ok(Json(meta.into()))
}

pub async fn model_info(
    State(state): State<AppState>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    let meta = state.service.model_metadata().await?;
    Ok(Json(meta.into()))
}

/// Accepts a multipart upload with the image in the `file` field.
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().unwrap_or("upload").to_string();

        // Reject before buffering the body
        state.service.admit(content_type.as_deref())?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;

        tracing::debug!(file_name = %file_name, bytes = data.len(), "Received upload");

        let result = state
            .service
            .handle(data.to_vec(), content_type.as_deref())
            .await?;
        return Ok(Json(DetectResponse::from(&result)));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field `{}`",
        UPLOAD_FIELD
    )))
}
