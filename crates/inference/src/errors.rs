use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced to the caller of a detection request.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Unsupported type: {0}. Use JPEG, PNG, or WebP.")]
    UnsupportedMediaType(String),

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Model resolution exhausted: {0}")]
    ModelResolutionExhausted(#[from] ResolveError),

    #[error("Detection failed: {0}")]
    InferenceFailure(String),

    #[error("Detection timed out after {0:?}")]
    InferenceTimeout(Duration),
}

impl InferenceError {
    /// Short stable name used as a metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::UnsupportedMediaType(_) => "unsupported_media_type",
            InferenceError::InvalidImage(_) => "invalid_image",
            InferenceError::ModelResolutionExhausted(_) => "model_resolution_exhausted",
            InferenceError::InferenceFailure(_) => "inference_failure",
            InferenceError::InferenceTimeout(_) => "inference_timeout",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::UnsupportedMediaType(_) | InferenceError::InvalidImage(_)
        )
    }
}

/// Every level of the model resolution chain failed.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no usable model weights ({})", .failures.join("; "))]
    Exhausted { failures: Vec<String> },
}

/// Remote weight fetch failure. Never fatal: the resolver falls through to
/// the next level.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Hub returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}
