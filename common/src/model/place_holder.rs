use serde::{Deserialize, Serialize};

/// An operator-defined placeholder stored in the `custom_placeholders` table.
///
/// Custom placeholders extend the schema registry beyond the client columns, and
/// their values come from the per-task `custom_field_values` map at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPlaceholder {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub field_type: PlaceholderType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderType {
    Text,
    Number,
    Currency,
    Date,
    Email,
}

impl PlaceholderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceholderType::Text => "text",
            PlaceholderType::Number => "number",
            PlaceholderType::Currency => "currency",
            PlaceholderType::Date => "date",
            PlaceholderType::Email => "email",
        }
    }

    /// Parses the stored column value, treating anything unknown as plain text.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "number" => PlaceholderType::Number,
            "currency" => PlaceholderType::Currency,
            "date" => PlaceholderType::Date,
            "email" => PlaceholderType::Email,
            _ => PlaceholderType::Text,
        }
    }
}

/// Checks a candidate custom placeholder name: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
