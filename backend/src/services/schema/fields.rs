use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::model::mapping::TemplateFieldMapping;
use log::error;

/// `GET /api/schema`
pub async fn list(state: web::Data<AppState>) -> impl Responder {
    match state.registry.list_fields().await {
        Ok(fields) => HttpResponse::Ok().json(fields),
        Err(e) => {
            error!("Listing schema fields failed: {}", e);
            HttpResponse::from_error(AppError::from(e))
        }
    }
}

/// `POST /api/schema` with a `{ literal: field }` body.
pub async fn validate(
    state: web::Data<AppState>,
    payload: web::Json<TemplateFieldMapping>,
) -> Result<HttpResponse, AppError> {
    let validation = state.registry.validate(&payload).await?;
    Ok(HttpResponse::Ok().json(validation))
}

/// `POST /api/schema/refresh`
pub async fn refresh(state: web::Data<AppState>) -> impl Responder {
    state.registry.invalidate();
    HttpResponse::NoContent().finish()
}
