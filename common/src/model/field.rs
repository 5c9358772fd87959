use serde::{Deserialize, Serialize};

/// Where a substitutable field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    /// A column of the client record.
    Client,
    /// A custom placeholder created by an operator.
    Placeholder,
    /// Derived at read time, with no backing column.
    Computed,
}

/// Metadata describing one substitutable data field.
///
/// Descriptors are produced by the schema registry on every query and are never
/// mutated after being handed to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Unique key inside the merged namespace, e.g. `first_name`.
    pub name: String,
    pub label: String,
    pub description: String,
    pub category: String,
    pub computed: bool,
    pub custom: bool,
    pub source: FieldSource,
}

impl FieldDescriptor {
    pub fn client(name: &str, label: String, category: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Client record column `{}`", name),
            label,
            category: category.to_string(),
            computed: false,
            custom: false,
            source: FieldSource::Client,
        }
    }

    pub fn computed(name: &str, label: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            category: "Computed".to_string(),
            computed: true,
            custom: false,
            source: FieldSource::Computed,
        }
    }
}
