use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::InferenceError;
use serde_json::json;

/// Error returned by handlers, rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Inference(InferenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(e) => match e {
                InferenceError::UnsupportedMediaType(_) | InferenceError::InvalidImage(_) => {
                    StatusCode::BAD_REQUEST
                }
                InferenceError::ModelResolutionExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                InferenceError::InferenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                InferenceError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Inference(e) => e.to_string(),
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        ApiError::Inference(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.detail(), "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.detail(), "Request rejected");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}
