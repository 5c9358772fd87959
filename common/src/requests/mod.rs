//! Request payloads accepted by the backend HTTP surface.

use crate::model::mapping::TemplateFieldMapping;
use crate::model::place_holder::PlaceholderType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `json` part of a multipart template upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Token -> field overrides chosen in the repair flow.
    #[serde(default)]
    pub placeholder_mappings: BTreeMap<String, String>,
}

/// Mapping-completion payload: the original upload plus resolved mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub file_name: String,
    /// The original `.docx` bytes, base64 encoded.
    pub file_base64: String,
    pub placeholder_mappings: BTreeMap<String, String>,
}

/// Saves the editor's HTML together with its placeholder bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMappingsRequest {
    pub html: String,
    #[serde(default)]
    pub mapping: TemplateFieldMapping,
    /// Save even when some bindings reference unknown fields.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDocumentRequest {
    pub task_id: String,
    /// Overrides the task's own template.
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGenerateRequest {
    pub template_id: String,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaceholderRequest {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub field_type: PlaceholderType,
}
