use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable per-template table of placeholder literal -> field name.
///
/// Keys are bare token names (`client_name`); lookups through
/// [`normalize_literal`] also accept the braced form (`{{client_name}}`).
pub type TemplateFieldMapping = BTreeMap<String, String>;

/// How the operator created a binding in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// A non-empty text selection was replaced by the marker.
    Highlight,
    /// The marker was inserted at a collapsed cursor.
    Click,
}

/// One concrete binding of a marker in the editing surface to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingInstance {
    pub instance_id: String,
    pub field: String,
    pub original_text: String,
    pub placeholder_markup: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
}

/// Strips surrounding braces and whitespace from a placeholder literal.
pub fn normalize_literal(literal: &str) -> &str {
    literal
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn braces_are_stripped_from_literals() {
        assert_eq!(normalize_literal("{{ email }}"), "email");
        assert_eq!(normalize_literal("{email}"), "email");
        assert_eq!(normalize_literal("email"), "email");
    }
}
