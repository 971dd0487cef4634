use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::processing::batch::BatchError;
use crate::storage::emotion_log::LogStoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No image files provided")]
    NoImages,
    #[error("Invalid upload: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error(transparent)]
    LogStore(#[from] LogStoreError),
    #[error("Background task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Empty => AppError::NoImages,
            BatchError::Log(e) => AppError::LogStore(e),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoImages | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::LogStore(_) | AppError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = if status.is_server_error() {
            log::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorResponse { error })
    }
}
