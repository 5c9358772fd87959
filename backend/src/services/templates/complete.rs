//! `POST /api/templates/upload/complete`
//!
//! Second attempt after a blocked upload. The client resends the original
//! document (base64) with the token -> field choices made in the repair
//! dialog, and the whole upload pipeline runs again from scratch: every token
//! must resolve and every chosen field must exist.

use super::upload::{ingest, UploadInput};
use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::requests::CompleteUploadRequest;

pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<CompleteUploadRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    let bytes = BASE64
        .decode(request.file_base64.trim())
        .map_err(|e| AppError::BadRequest(format!("file_base64 is not valid base64: {}", e)))?;

    let record = ingest(
        &state,
        UploadInput {
            name: request.name,
            description: request.description,
            file_name: request.file_name,
            bytes,
            overrides: request.placeholder_mappings,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}
