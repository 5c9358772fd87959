use crate::model::mapping::TemplateFieldMapping;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document template as persisted in the `templates` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub html_content: String,
    #[serde(default)]
    pub field_mappings: TemplateFieldMapping,
    #[serde(default)]
    pub detected_placeholders: Vec<DetectedPlaceholder>,
    pub status: TemplateStatus,
    /// Object-store path of the original uploaded document, if any.
    pub document_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A placeholder found in the template, with the field it resolves to when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedPlaceholder {
    pub name: String,
    pub field: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    Draft,
    Active,
    Archived,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Draft => "draft",
            TemplateStatus::Active => "active",
            TemplateStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "active" => TemplateStatus::Active,
            "archived" => TemplateStatus::Archived,
            _ => TemplateStatus::Draft,
        }
    }
}
