//! # Template Field-Mapping Persistence
//!
//! `POST /api/templates/{template_id}/mappings` stores the HTML produced by
//! an editing session together with its placeholder bindings.
//!
//! The stored mapping is re-derived from the `{{name}}` literals that are
//! actually present in the submitted HTML: a supplied entry is kept only when
//! its literal occurs, and a literal without an entry maps to itself. The
//! result is validated against the schema registry. Unknown fields do not
//! block the save outright; they produce `409 Conflict` with the validation
//! until the client resubmits with `confirm: true`.

use super::record::{self, detected_placeholders, TEMPLATES_TABLE};
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::Row;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::mapper::placeholder_literals;
use common::model::mapping::{normalize_literal, TemplateFieldMapping};
use common::model::template::TemplateRecord;
use common::model::validation::ValidationResult;
use common::requests::SaveMappingsRequest;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct SaveOutcome {
    pub template: TemplateRecord,
    pub validation: ValidationResult,
}

pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
    payload: web::Json<SaveMappingsRequest>,
) -> Result<HttpResponse, AppError> {
    let template_id = template_id.into_inner();
    let request = payload.into_inner();

    let existing = record::load(state.db.as_ref(), &template_id)?;
    let mapping = derive_mapping(&request.html, &request.mapping);
    let validation = state.registry.validate(&mapping).await?;

    if !validation.valid {
        if !request.confirm {
            info!(
                "Save of template {} needs confirmation: {} unknown field(s)",
                template_id, validation.invalid_count
            );
            return Err(AppError::NeedsConfirmation(validation));
        }
        warn!(
            "Saving template {} with {} unknown field(s): {}",
            template_id,
            validation.invalid_count,
            validation.invalid_placeholders().collect::<Vec<_>>().join(", ")
        );
    }

    let now = Utc::now();
    let mut changes = Row::new();
    changes.insert("html_content".into(), json!(request.html));
    changes.insert("field_mappings".into(), json!(mapping));
    changes.insert(
        "detected_placeholders".into(),
        json!(detected_placeholders(&mapping)),
    );
    changes.insert("updated_at".into(), json!(now.to_rfc3339()));
    state
        .db
        .update(TEMPLATES_TABLE, &[("id", json!(template_id))], &changes)?;

    let template = TemplateRecord {
        html_content: request.html,
        detected_placeholders: detected_placeholders(&mapping),
        field_mappings: mapping,
        updated_at: now,
        ..existing
    };
    info!(
        "Saved template {} with {} binding(s)",
        template.id,
        template.field_mappings.len()
    );
    Ok(HttpResponse::Ok().json(SaveOutcome {
        template,
        validation,
    }))
}

/// One entry per literal in `html`; supplied bindings win, the rest map to themselves.
pub fn derive_mapping(html: &str, supplied: &TemplateFieldMapping) -> TemplateFieldMapping {
    let supplied: TemplateFieldMapping = supplied
        .iter()
        .map(|(literal, field)| (normalize_literal(literal).to_string(), field.trim().to_string()))
        .filter(|(_, field)| !field.is_empty())
        .collect();
    placeholder_literals(html)
        .into_iter()
        .map(|literal| {
            let field = supplied.get(&literal).cloned().unwrap_or_else(|| literal.clone());
            (literal, field)
        })
        .collect()
}
