use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of trust-administration work for one client.
///
/// `custom_field_values` carries the task-specific values for custom
/// placeholders and take precedence over client data during population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub client_id: String,
    pub template_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub custom_field_values: HashMap<String, String>,
}

/// Metadata of a document produced by the populator and stored in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub id: String,
    pub task_id: String,
    pub template_id: String,
    pub path: String,
    /// Tokens that ended as `[MISSING: ...]` sentinels.
    #[serde(default)]
    pub unresolved: Vec<String>,
    pub created_at: DateTime<Utc>,
}
