//! # Document Generation Service
//!
//! `POST /api/documents/generate` turns one task into a finished document:
//!
//! 1.  **Loading**: the task, its client and the template (the request may
//!     override the task's own template) are read from the relational store.
//! 2.  **Population**: the template HTML is filled by the `Populator` with the
//!     task's custom values, the client record and the computed fields.
//!     Anything that cannot be resolved becomes a `[MISSING: ...]` sentinel.
//! 3.  **Storage**: the HTML is written to the `documents` bucket as
//!     `{task_id}/{document_id}.html` and a `generated_documents` row records
//!     it together with the unresolved tokens.
//! 4.  **Response**: the populated HTML, the unresolved and fuzzy-matched
//!     tokens, and a signed download URL.
//!
//! [`DocumentGenerator`] is plain data behind `Arc`s, so batch jobs clone it
//! into blocking workers.

use crate::error::AppError;
use crate::services::schema::registry::{CLIENTS_TABLE, SYSTEM_COLUMNS};
use crate::services::templates::record;
use crate::state::AppState;
use crate::storage::{
    json_column, text_column, ObjectStore, RelationalStore, Row, StorageError, StoreOptions,
    DOCUMENTS_BUCKET,
};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use common::model::task::{GeneratedDocument, Task};
use common::populate::{FuzzyMatch, Populator};
use common::requests::GenerateDocumentRequest;
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const TASKS_TABLE: &str = "tasks";
pub const GENERATED_DOCUMENTS_TABLE: &str = "generated_documents";

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub document: GeneratedDocument,
    pub html: String,
    pub unresolved: Vec<String>,
    pub fuzzy: Vec<FuzzyMatch>,
    pub signed_url: String,
}

#[derive(Clone)]
pub struct DocumentGenerator {
    db: Arc<dyn RelationalStore>,
    objects: Arc<dyn ObjectStore>,
    populator: Populator,
    signed_url_ttl: Duration,
}

impl DocumentGenerator {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            objects: state.objects.clone(),
            populator: state.populator(),
            signed_url_ttl: state.config.signed_url_ttl,
        }
    }

    pub fn generate(
        &self,
        task_id: &str,
        template_override: Option<&str>,
    ) -> Result<GenerationOutcome, AppError> {
        let task = self.load_task(task_id)?;
        let template_id = template_override
            .or(task.template_id.as_deref())
            .ok_or_else(|| AppError::BadRequest(format!("task {} has no template", task.id)))?
            .to_string();
        let template = record::load(self.db.as_ref(), &template_id)?;
        let client = self.load_client(&task.client_id)?;

        let populated = self.populator.populate(
            &template.html_content,
            &template.field_mappings,
            &client,
            &task.custom_field_values,
        );
        if !populated.unresolved.is_empty() {
            warn!(
                "Task {}: {} placeholder(s) left missing: {}",
                task.id,
                populated.unresolved.len(),
                populated.unresolved.join(", ")
            );
        }

        let document_id = Uuid::new_v4().to_string();
        let path = format!("{}/{}.html", task.id, document_id);
        let path = self.objects.store(
            DOCUMENTS_BUCKET,
            &path,
            populated.html.as_bytes(),
            &StoreOptions::new("text/html; charset=utf-8"),
        )?;
        let document = GeneratedDocument {
            id: document_id,
            task_id: task.id.clone(),
            template_id,
            path,
            unresolved: populated.unresolved.clone(),
            created_at: Utc::now(),
        };
        self.db
            .insert(GENERATED_DOCUMENTS_TABLE, &document_to_row(&document))?;
        let signed_url =
            self.objects
                .create_signed_url(DOCUMENTS_BUCKET, &document.path, self.signed_url_ttl)?;

        info!(
            "Generated document {} for task {} from template {}",
            document.id, document.task_id, document.template_id
        );
        Ok(GenerationOutcome {
            document,
            html: populated.html,
            unresolved: populated.unresolved,
            fuzzy: populated.fuzzy,
            signed_url,
        })
    }

    fn load_task(&self, task_id: &str) -> Result<Task, AppError> {
        let row = self
            .db
            .select_one(TASKS_TABLE, &[("id", json!(task_id))])?
            .ok_or_else(|| AppError::NotFound(format!("task {}", task_id)))?;
        Ok(task_from_row(&row)?)
    }

    /// The client record without bookkeeping columns.
    fn load_client(&self, client_id: &str) -> Result<Map<String, Value>, AppError> {
        let mut row = self
            .db
            .select_one(CLIENTS_TABLE, &[("id", json!(client_id))])?
            .ok_or_else(|| AppError::NotFound(format!("client {}", client_id)))?;
        row.retain(|column, _| !SYSTEM_COLUMNS.contains(&column.as_str()));
        Ok(row)
    }
}

pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<GenerateDocumentRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    let generator = DocumentGenerator::from_state(&state);
    let outcome = web::block(move || {
        generator.generate(&request.task_id, request.template_id.as_deref())
    })
    .await??;
    Ok(HttpResponse::Ok().json(outcome))
}

fn task_from_row(row: &Row) -> Result<Task, StorageError> {
    let values: Map<String, Value> = json_column(row, "custom_field_values")?;
    let custom_field_values: HashMap<String, String> = values
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect();
    Ok(Task {
        id: text_column(row, "id").ok_or_else(|| StorageError::NotFound("tasks.id".into()))?,
        client_id: text_column(row, "client_id")
            .ok_or_else(|| StorageError::NotFound("tasks.client_id".into()))?,
        template_id: text_column(row, "template_id").filter(|t| !t.is_empty()),
        title: text_column(row, "title").unwrap_or_default(),
        custom_field_values,
    })
}

fn document_to_row(document: &GeneratedDocument) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(document.id));
    row.insert("task_id".into(), json!(document.task_id));
    row.insert("template_id".into(), json!(document.template_id));
    row.insert("path".into(), json!(document.path));
    row.insert("unresolved".into(), json!(document.unresolved));
    row.insert("created_at".into(), json!(document.created_at.to_rfc3339()));
    row
}

/// Loads the metadata of one generated document.
pub fn load_document(
    db: &dyn RelationalStore,
    document_id: &str,
) -> Result<GeneratedDocument, AppError> {
    let row = db
        .select_one(GENERATED_DOCUMENTS_TABLE, &[("id", json!(document_id))])?
        .ok_or_else(|| AppError::NotFound(format!("document {}", document_id)))?;
    let text = |column: &str| {
        text_column(&row, column)
            .ok_or_else(|| StorageError::NotFound(format!("generated_documents.{}", column)))
    };
    Ok(GeneratedDocument {
        id: text("id")?,
        task_id: text("task_id")?,
        template_id: text("template_id")?,
        path: text("path")?,
        unresolved: json_column(&row, "unresolved")?,
        created_at: text_column(&row, "created_at")
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}
