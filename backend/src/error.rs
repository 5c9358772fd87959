//! Service-level error type and its HTTP mapping.
//!
//! | Variant | Status |
//! |---|---|
//! | `InvalidDocumentFormat`, `BadRequest` | 400 |
//! | `NotFound` | 404 |
//! | `NeedsConfirmation` | 409, body carries the `ValidationResult` |
//! | `InvalidPlaceholder` | 422, body is `{ blockUpload, validation }` |
//! | `Storage` | 503 (404 when the store reports a missing object) |
//! | `Render` | 500 |
//! | `Blocking` | 503 |

use crate::storage::StorageError;
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::model::validation::{BlockedUpload, ValidationResult};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid document format: {0}")]
    InvalidDocumentFormat(String),

    #[error("{} placeholder(s) do not match a known field", .0.invalid_count)]
    InvalidPlaceholder(ValidationResult),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{} mapping(s) reference unknown fields; resubmit with confirm", .0.invalid_count)]
    NeedsConfirmation(ValidationResult),

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("blocking worker failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidDocumentFormat(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidPlaceholder(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NeedsConfirmation(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) | AppError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Storage(StorageError::BadSignature) => StatusCode::FORBIDDEN,
            AppError::Storage(StorageError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Blocking(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            AppError::InvalidPlaceholder(validation) => {
                response.json(BlockedUpload::new(validation.clone()))
            }
            AppError::NeedsConfirmation(validation) => response.json(json!({
                "error": self.to_string(),
                "validation": validation,
            })),
            _ => response.json(json!({ "error": self.to_string() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn blocked_uploads_carry_the_validation() {
        let validation = ValidationResult::from_parts(Vec::new(), Vec::new());
        let error = AppError::InvalidPlaceholder(validation);
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(error.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["blockUpload"], true);
        assert_eq!(json["validation"]["invalidCount"], 0);
    }

    #[test]
    fn storage_errors_map_by_kind() {
        assert_eq!(
            AppError::from(StorageError::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StorageError::Unavailable).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[actix_web::test]
    async fn lost_blocking_workers_are_503() {
        // `BlockingError` is `#[non_exhaustive]`; a panicking blocking task is
        // the only public way to obtain one.
        let blocking = actix_web::web::block(|| -> () { panic!("worker lost") })
            .await
            .unwrap_err();
        let error = AppError::from(blocking);
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
