use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::services::render::RenderError;
use crate::services::participants::roster::RosterError;
use crate::storage::StorageError;

/// Errors surfaced by the HTTP layer.
///
/// Render failures of single participants never reach this type; they are
/// collected into the generation response. `RenderFailure` is only used when
/// nothing at all could be produced.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("generation failed: {0}")]
    RenderFailure(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<RosterError> for AppError {
    fn from(value: RosterError) -> Self {
        AppError::Validation(value.to_string())
    }
}

impl From<RenderError> for AppError {
    fn from(value: RenderError) -> Self {
        AppError::RenderFailure(value.to_string())
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(value: actix_multipart::MultipartError) -> Self {
        AppError::Validation(format!("malformed upload: {value}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RenderFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Storage(e) = self {
            log::error!("storage failure: {}", e);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }))
    }
}
