//! Conversions between [`TemplateRecord`] and rows of the `templates` table.

use crate::error::AppError;
use crate::storage::{json_column, text_column, RelationalStore, Row, StorageError};
use chrono::{DateTime, Utc};
use common::model::mapping::TemplateFieldMapping;
use common::model::template::{DetectedPlaceholder, TemplateRecord, TemplateStatus};
use serde_json::json;

pub const TEMPLATES_TABLE: &str = "templates";

pub fn to_row(record: &TemplateRecord) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(record.id));
    row.insert("name".into(), json!(record.name));
    row.insert("description".into(), json!(record.description));
    row.insert("html_content".into(), json!(record.html_content));
    row.insert("field_mappings".into(), json!(record.field_mappings));
    row.insert(
        "detected_placeholders".into(),
        json!(record.detected_placeholders),
    );
    row.insert("status".into(), json!(record.status.as_str()));
    row.insert("document_path".into(), json!(record.document_path));
    row.insert("created_at".into(), json!(record.created_at.to_rfc3339()));
    row.insert("updated_at".into(), json!(record.updated_at.to_rfc3339()));
    row
}

pub fn from_row(row: &Row) -> Result<TemplateRecord, StorageError> {
    let required = |column: &str| {
        text_column(row, column)
            .ok_or_else(|| StorageError::NotFound(format!("templates.{}", column)))
    };
    Ok(TemplateRecord {
        id: required("id")?,
        name: required("name")?,
        description: text_column(row, "description").unwrap_or_default(),
        html_content: text_column(row, "html_content").unwrap_or_default(),
        field_mappings: json_column::<TemplateFieldMapping>(row, "field_mappings")?,
        detected_placeholders: json_column::<Vec<DetectedPlaceholder>>(row, "detected_placeholders")?,
        status: TemplateStatus::parse(&text_column(row, "status").unwrap_or_default()),
        document_path: text_column(row, "document_path"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    })
}

/// Loads one template or fails with `NotFound`.
pub fn load(db: &dyn RelationalStore, template_id: &str) -> Result<TemplateRecord, AppError> {
    let row = db
        .select_one(TEMPLATES_TABLE, &[("id", json!(template_id))])?
        .ok_or_else(|| AppError::NotFound(format!("template {}", template_id)))?;
    Ok(from_row(&row)?)
}

/// Pairs every literal with the field it is bound to.
pub fn detected_placeholders(mapping: &TemplateFieldMapping) -> Vec<DetectedPlaceholder> {
    mapping
        .iter()
        .map(|(name, field)| DetectedPlaceholder {
            name: name.clone(),
            field: Some(field.clone()).filter(|f| !f.is_empty()),
        })
        .collect()
}

fn timestamp(row: &Row, column: &str) -> DateTime<Utc> {
    text_column(row, column)
        .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_survive_the_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = DateTime::parse_from_rfc3339("2026-10-16T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mapping: TemplateFieldMapping =
            [("client_name".to_string(), "full_name".to_string())].into();
        let record = TemplateRecord {
            id: "t1".into(),
            name: "Engagement letter".into(),
            description: String::new(),
            html_content: "<p>{{client_name}}</p>".into(),
            detected_placeholders: detected_placeholders(&mapping),
            field_mappings: mapping,
            status: TemplateStatus::Active,
            document_path: None,
            created_at: now,
            updated_at: now,
        };
        store.insert(TEMPLATES_TABLE, &to_row(&record)).unwrap();

        assert_eq!(load(&store, "t1").unwrap(), record);
        assert!(matches!(load(&store, "missing"), Err(AppError::NotFound(_))));
    }
}
