use super::record;
use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};

/// `GET /api/templates/{template_id}/validation`
///
/// Re-validates the stored mapping against the current schema. Fields can
/// disappear after a save (a custom placeholder deleted, a column dropped), so
/// the result is always computed fresh.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let template = record::load(state.db.as_ref(), &template_id)?;
    let validation = state.registry.validate(&template.field_mappings).await?;
    Ok(HttpResponse::Ok().json(validation))
}
