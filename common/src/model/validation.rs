use serde::{Deserialize, Serialize};

/// A placeholder whose mapped field exists in the schema registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidPlaceholder {
    pub name: String,
    pub field: String,
}

/// A placeholder whose mapped field is unknown, with the best-effort suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidMapping {
    /// The placeholder literal (token name) that carried the mapping.
    pub placeholder: String,
    /// The field name that failed validation.
    pub field_name: String,
    pub suggestion: Option<String>,
}

/// Outcome of checking a set of placeholder bindings against the registry.
///
/// Always recomputed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub valid_placeholders: Vec<ValidPlaceholder>,
    pub invalid_mappings: Vec<InvalidMapping>,
}

impl ValidationResult {
    pub fn from_parts(
        valid_placeholders: Vec<ValidPlaceholder>,
        invalid_mappings: Vec<InvalidMapping>,
    ) -> Self {
        Self {
            valid: invalid_mappings.is_empty(),
            valid_count: valid_placeholders.len(),
            invalid_count: invalid_mappings.len(),
            valid_placeholders,
            invalid_mappings,
        }
    }

    pub fn total(&self) -> usize {
        self.valid_count + self.invalid_count
    }

    /// Names of the placeholders that failed validation.
    pub fn invalid_placeholders(&self) -> impl Iterator<Item = &str> {
        self.invalid_mappings.iter().map(|m| m.placeholder.as_str())
    }
}

/// Payload returned when an upload cannot be accepted until placeholders are repaired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedUpload {
    pub block_upload: bool,
    pub validation: ValidationResult,
}

impl BlockedUpload {
    pub fn new(validation: ValidationResult) -> Self {
        Self {
            block_upload: true,
            validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_the_partition() {
        let result = ValidationResult::from_parts(
            vec![ValidPlaceholder {
                name: "first_name".into(),
                field: "first_name".into(),
            }],
            vec![InvalidMapping {
                placeholder: "unknown_field".into(),
                field_name: "unknown_field".into(),
                suggestion: None,
            }],
        );
        assert!(!result.valid);
        assert_eq!(result.total(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["validCount"], 1);
        assert_eq!(json["invalidMappings"][0]["fieldName"], "unknown_field");
        assert!(json["invalidMappings"][0]["suggestion"].is_null());
    }
}
