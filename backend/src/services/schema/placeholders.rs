//! Custom placeholder management.
//!
//! Custom placeholders extend the registry with operator-defined fields whose
//! values come from each task's `custom_field_values`. Every write invalidates
//! the schema cache so the next field listing reflects it.

use super::registry::{CUSTOM_PLACEHOLDERS_TABLE, SYSTEM_COLUMNS};
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::Row;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::model::place_holder::{is_valid_placeholder_name, CustomPlaceholder, PlaceholderType};
use common::requests::CreatePlaceholderRequest;
use log::info;
use serde_json::json;
use uuid::Uuid;

/// `GET /api/schema/placeholders`
pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let placeholders: Vec<CustomPlaceholder> = state
        .db
        .select(CUSTOM_PLACEHOLDERS_TABLE, &[])?
        .iter()
        .filter_map(placeholder_from_row)
        .collect();
    Ok(HttpResponse::Ok().json(placeholders))
}

/// `POST /api/schema/placeholders`
pub async fn create(
    state: web::Data<AppState>,
    payload: web::Json<CreatePlaceholderRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    let name = request.name.trim().to_string();
    if !is_valid_placeholder_name(&name) || SYSTEM_COLUMNS.contains(&name.as_str()) {
        return Err(AppError::BadRequest(format!(
            "'{}' is not a valid placeholder name",
            request.name
        )));
    }
    if state.registry.field_names().await?.contains(&name) {
        return Err(AppError::BadRequest(format!("field '{}' already exists", name)));
    }

    let placeholder = CustomPlaceholder {
        id: Uuid::new_v4().to_string(),
        name,
        label: request.label.trim().to_string(),
        description: request.description,
        field_type: request.field_type,
    };
    let mut row = Row::new();
    row.insert("id".into(), json!(placeholder.id));
    row.insert("name".into(), json!(placeholder.name));
    row.insert("label".into(), json!(placeholder.label));
    row.insert("description".into(), json!(placeholder.description));
    row.insert("field_type".into(), json!(placeholder.field_type.as_str()));
    row.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
    state.db.insert(CUSTOM_PLACEHOLDERS_TABLE, &row)?;

    state.registry.invalidate();
    info!("Created custom placeholder '{}'", placeholder.name);
    Ok(HttpResponse::Created().json(placeholder))
}

/// `DELETE /api/schema/placeholders/{id}`
pub async fn remove(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let deleted = state
        .db
        .delete(CUSTOM_PLACEHOLDERS_TABLE, &[("id", json!(id))])?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("placeholder {}", id)));
    }
    state.registry.invalidate();
    info!("Deleted custom placeholder {}", id);
    Ok(HttpResponse::NoContent().finish())
}

fn placeholder_from_row(row: &Row) -> Option<CustomPlaceholder> {
    let text = |key: &str| row.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Some(CustomPlaceholder {
        id: text("id")?,
        name: text("name")?,
        label: text("label").unwrap_or_default(),
        description: text("description").unwrap_or_default(),
        field_type: PlaceholderType::parse(&text("field_type").unwrap_or_default()),
    })
}
