//! # Template Retrieval Service
//!
//! `GET /api/templates/{template_id}` returns the stored `TemplateRecord`:
//! HTML content, field mapping, detected placeholders and status. The editor
//! loads this record to start a mapping session.

use super::record;
use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};

/// Actix web handler for `GET /api/templates/{template_id}`.
///
/// # Returns
/// - `200 OK` with the `TemplateRecord` as JSON.
/// - `404 Not Found` when no template has that id.
/// - `503 Service Unavailable` when the store cannot be read.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let template = record::load(state.db.as_ref(), &template_id)?;
    Ok(HttpResponse::Ok().json(template))
}
