//! # Template Upload Service
//!
//! `POST /api/templates/upload` accepts a multipart form with two parts:
//!
//! - `json`: an `UploadRequest` (name, description, optional token -> field
//!   overrides chosen in the repair flow);
//! - `file`: the `.docx` document.
//!
//! ## Workflow
//!
//! 1.  **Extraction**: every `{name}` token is pulled from the document, and
//!     the document is converted to HTML; `{{name}}` literals of the HTML
//!     join the token set.
//! 2.  **Reconciliation**: each token is bound to the field of the same name,
//!     or to its override, and validated against the schema registry. Tokens
//!     without a rule-based suggestion may receive one from the configured
//!     `SuggestionService`.
//! 3.  **Blocking**: a single invalid binding rejects the upload with
//!     `422 { blockUpload: true, validation }`; nothing is stored. A document
//!     without tokens is never blocked.
//! 4.  **Storage**: the original bytes go to the `templates` bucket under
//!     `{template_id}_{md5}.docx`, and a draft `TemplateRecord` is inserted.
//!
//! `upload/complete` (see `complete.rs`) feeds the same pipeline.

use super::convert::docx_to_html;
use super::extract::extract;
use super::record::{detected_placeholders, to_row, TEMPLATES_TABLE};
use super::suggest::enrich_validation;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::{StoreOptions, TEMPLATES_BUCKET};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::mapper::placeholder_literals;
use common::model::mapping::{normalize_literal, TemplateFieldMapping};
use common::model::template::{TemplateRecord, TemplateStatus};
use common::requests::UploadRequest;
use futures_util::StreamExt;
use log::{info, warn};
use serde_json::from_slice;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A document ready to go through the upload pipeline.
pub struct UploadInput {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub overrides: BTreeMap<String, String>,
}

pub async fn process(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let input = read_upload(payload).await?;
    let record = ingest(&state, input).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn read_upload(mut payload: Multipart) -> Result<UploadInput, AppError> {
    let mut request: Option<UploadRequest> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let part_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match part_name.as_deref() {
            Some("file") => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    bytes.extend_from_slice(&chunk.map_err(|e| AppError::BadRequest(e.to_string()))?);
                }
                file = Some((file_name, bytes));
            }
            Some("json") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    bytes.extend_from_slice(&chunk.map_err(|e| AppError::BadRequest(e.to_string()))?);
                }
                request = Some(
                    from_slice(&bytes)
                        .map_err(|e| AppError::BadRequest(format!("invalid json part: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let request = request.ok_or_else(|| AppError::BadRequest("missing json part".to_string()))?;
    let (file_name, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing file part".to_string()))?;
    Ok(UploadInput {
        name: request.name,
        description: request.description,
        file_name,
        bytes,
        overrides: request.placeholder_mappings,
    })
}

/// Runs extraction, validation, conversion and storage for one document.
pub async fn ingest(state: &AppState, input: UploadInput) -> Result<TemplateRecord, AppError> {
    if !input.file_name.to_ascii_lowercase().ends_with(".docx") {
        return Err(AppError::InvalidDocumentFormat(
            "the file must end with .docx".to_string(),
        ));
    }
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("template name must not be empty".to_string()));
    }

    let bytes = input.bytes;
    let (extraction, html, bytes) = web::block(move || -> Result<_, AppError> {
        let extraction = extract(&bytes)?;
        let html = docx_to_html(&bytes)?;
        Ok((extraction, html, bytes))
    })
    .await??;
    // Tokens found by either reading must resolve.
    let mut tokens = extraction.placeholders;
    tokens.extend(placeholder_literals(&html));
    let mapping = bind_tokens(&tokens, &input.overrides);

    if !mapping.is_empty() {
        let mut validation = if input.overrides.is_empty() {
            state.registry.reconcile(&tokens).await?
        } else {
            state.registry.validate(&mapping).await?
        };
        if !validation.valid {
            let names = state.registry.field_names().await?;
            enrich_validation(
                state.suggestions.as_ref(),
                &mut validation,
                &extraction.plain_text,
                &names,
                state.config.suggestion_min_confidence,
            );
            warn!(
                "Blocking upload of '{}': {} of {} placeholder(s) unresolved",
                input.file_name,
                validation.invalid_count,
                validation.total()
            );
            return Err(AppError::InvalidPlaceholder(validation));
        }
    }

    let id = Uuid::new_v4().to_string();
    let path = format!("{}_{:x}.docx", id, md5::compute(&bytes));
    let now = Utc::now();
    let record = TemplateRecord {
        id,
        name: input.name.trim().to_string(),
        description: input.description,
        html_content: html,
        detected_placeholders: detected_placeholders(&mapping),
        field_mappings: mapping,
        status: TemplateStatus::Draft,
        document_path: None,
        created_at: now,
        updated_at: now,
    };

    let db = state.db.clone();
    let objects = state.objects.clone();
    let record = web::block(move || -> Result<_, AppError> {
        let document_path = objects.store(
            TEMPLATES_BUCKET,
            &path,
            &bytes,
            &StoreOptions::new(DOCX_CONTENT_TYPE).upsert(),
        )?;
        let record = TemplateRecord {
            document_path: Some(document_path),
            ..record
        };
        db.insert(TEMPLATES_TABLE, &to_row(&record))?;
        Ok(record)
    })
    .await??;
    info!(
        "Template {} created from '{}' with {} placeholder(s)",
        record.id,
        input.file_name,
        record.field_mappings.len()
    );
    Ok(record)
}

/// Binds each token to its override, or to the field of the same name.
fn bind_tokens<'a, I>(tokens: I, overrides: &BTreeMap<String, String>) -> TemplateFieldMapping
where
    I: IntoIterator<Item = &'a String>,
{
    let overrides: BTreeMap<&str, &str> = overrides
        .iter()
        .map(|(token, field)| (normalize_literal(token), field.trim()))
        .filter(|(_, field)| !field.is_empty())
        .collect();
    tokens
        .into_iter()
        .map(|token| {
            let field = overrides.get(token.as_str()).copied().unwrap_or(token.as_str());
            (token.clone(), field.to_string())
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::{content_type, multipart_body};
    use super::*;
    use crate::services::templates::extract::fixtures::{docx, paragraphs};
    use crate::state::testing::app_state;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use common::model::validation::BlockedUpload;
    use serde_json::json;

    fn upload_request(json: serde_json::Value, file_name: &str, bytes: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/templates/upload")
            .insert_header((header::CONTENT_TYPE, content_type()))
            .set_payload(multipart_body(&json.to_string(), file_name, bytes))
    }

    #[actix_web::test]
    async fn overrides_replace_identity_bindings() {
        let tokens = vec!["client_name".to_string(), "email".to_string()];
        let overrides: BTreeMap<String, String> = [
            ("{{client_name}}".to_string(), "full_name".to_string()),
            ("unused".to_string(), "phone".to_string()),
        ]
        .into();
        let mapping = bind_tokens(&tokens, &overrides);
        assert_eq!(mapping["client_name"], "full_name");
        assert_eq!(mapping["email"], "email");
        assert_eq!(mapping.len(), 2);
    }

    #[actix_web::test]
    async fn unknown_tokens_block_the_upload() {
        let (state, _dir) = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let bytes = paragraphs(&["Dear {first_name}, re {unknown_field}."]);
        let req = upload_request(json!({"name": "Letter"}), "letter.docx", &bytes).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let blocked: BlockedUpload = test::read_body_json(resp).await;
        assert!(blocked.block_upload);
        assert_eq!(blocked.validation.valid_count, 1);
        assert_eq!(blocked.validation.invalid_count, 1);
        assert_eq!(blocked.validation.invalid_mappings[0].placeholder, "unknown_field");
        assert!(blocked.validation.invalid_mappings[0].suggestion.is_none());
    }

    #[actix_web::test]
    async fn tokens_split_across_runs_still_block() {
        let (state, _dir) = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let bytes = docx(
            "<w:p><w:r><w:t xml:space=\"preserve\">Ref {bogus_</w:t></w:r><w:r><w:t>field}</w:t></w:r></w:p>",
        );
        let req = upload_request(json!({"name": "Ref"}), "ref.docx", &bytes).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let blocked: BlockedUpload = test::read_body_json(resp).await;
        assert_eq!(blocked.validation.invalid_mappings.len(), 1);
        assert_eq!(blocked.validation.invalid_mappings[0].placeholder, "bogus_field");
    }

    #[actix_web::test]
    async fn valid_documents_become_draft_templates() {
        let (state, _dir) = app_state();
        let state = web::Data::new(state);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(super::super::configure_routes()),
        )
        .await;

        let bytes = paragraphs(&["Dear {client_name},", "Trust: {trust_name}"]);
        let req = upload_request(
            json!({"name": "Letter", "placeholder_mappings": {"client_name": "full_name"}}),
            "letter.docx",
            &bytes,
        )
        .to_request();
        let record: TemplateRecord = test::call_and_read_body_json(&app, req).await;

        assert_eq!(record.status, TemplateStatus::Draft);
        assert_eq!(
            record.html_content,
            "<p>Dear {{client_name}},</p><p>Trust: {{trust_name}}</p>"
        );
        assert_eq!(record.field_mappings["client_name"], "full_name");
        assert_eq!(record.field_mappings["trust_name"], "trust_name");

        let path = record.document_path.clone().unwrap();
        assert!(path.starts_with(&record.id) && path.ends_with(".docx"));
        assert_eq!(state.objects.fetch(TEMPLATES_BUCKET, &path).unwrap(), bytes);
    }

    #[actix_web::test]
    async fn documents_without_tokens_are_never_blocked() {
        let (state, _dir) = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let req = upload_request(json!({"name": "Plain"}), "plain.docx", &paragraphs(&["Hello."]))
            .to_request();
        let record: TemplateRecord = test::call_and_read_body_json(&app, req).await;
        assert!(record.field_mappings.is_empty());
        assert_eq!(record.html_content, "<p>Hello.</p>");
    }

    #[actix_web::test]
    async fn ai_suggestions_fill_only_empty_suggestions() {
        use crate::services::templates::suggest::{AiSuggestion, SuggestionError, SuggestionService};
        use std::sync::Arc;

        struct Fixed;
        impl SuggestionService for Fixed {
            fn suggest_mappings(
                &self,
                _text: &str,
                tokens: &[String],
            ) -> Result<Vec<AiSuggestion>, SuggestionError> {
                Ok(tokens
                    .iter()
                    .map(|t| AiSuggestion {
                        placeholder: t.clone(),
                        field: "trust_name".into(),
                        confidence: 0.8,
                    })
                    .collect())
            }
        }

        let (state, _dir) = app_state();
        let state = state.with_suggestions(Arc::new(Fixed));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let bytes = paragraphs(&["{mail} of {grantor}"]);
        let req = upload_request(json!({"name": "Deed"}), "deed.docx", &bytes).to_request();
        let blocked: BlockedUpload = test::call_and_read_body_json(&app, req).await;
        let suggestion = |name: &str| {
            blocked
                .validation
                .invalid_mappings
                .iter()
                .find(|m| m.placeholder == name)
                .and_then(|m| m.suggestion.clone())
        };
        assert_eq!(suggestion("mail").as_deref(), Some("email"));
        assert_eq!(suggestion("grantor").as_deref(), Some("trust_name"));
    }

    #[actix_web::test]
    async fn non_docx_files_are_rejected() {
        let (state, _dir) = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(super::super::configure_routes()),
        )
        .await;

        let req = upload_request(json!({"name": "Sheet"}), "data.csv", b"a,b").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
