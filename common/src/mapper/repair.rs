//! Repair workflow for uploads blocked by invalid placeholders.
//!
//! A blocked upload returns a [`ValidationResult`]. The operator walks every
//! invalid token and picks a valid field for it (the rule-based suggestion is
//! preselected when it is itself valid). Once nothing is left unresolved, the
//! session yields the token -> field mapping the completion endpoint accepts.

use super::error::MapperError;
use crate::model::mapping::TemplateFieldMapping;
use crate::model::validation::ValidationResult;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairEntry {
    pub placeholder: String,
    /// Field the token was bound to when validation failed.
    pub original_field: String,
    pub suggestion: Option<String>,
    /// Operator's choice; starts as the suggestion when that field is valid.
    pub selected: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RepairSession {
    entries: Vec<RepairEntry>,
    valid_fields: HashSet<String>,
    accepted: TemplateFieldMapping,
}

impl RepairSession {
    pub fn from_validation<I>(validation: &ValidationResult, valid_fields: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let valid_fields: HashSet<String> = valid_fields.into_iter().collect();
        let entries = validation
            .invalid_mappings
            .iter()
            .map(|invalid| RepairEntry {
                placeholder: invalid.placeholder.clone(),
                original_field: invalid.field_name.clone(),
                suggestion: invalid.suggestion.clone(),
                selected: invalid
                    .suggestion
                    .clone()
                    .filter(|s| valid_fields.contains(s)),
            })
            .collect();
        let accepted = validation
            .valid_placeholders
            .iter()
            .map(|valid| (valid.name.clone(), valid.field.clone()))
            .collect();
        Self {
            entries,
            valid_fields,
            accepted,
        }
    }

    pub fn entries(&self) -> &[RepairEntry] {
        &self.entries
    }

    /// Binds `placeholder` to `field`; the field must exist in the registry snapshot.
    pub fn select(&mut self, placeholder: &str, field: &str) -> Result<(), MapperError> {
        let field = field.trim();
        if !self.valid_fields.contains(field) {
            return Err(MapperError::InvalidField(field.to_string()));
        }
        let entry = self.entry_mut(placeholder)?;
        entry.selected = Some(field.to_string());
        Ok(())
    }

    pub fn clear(&mut self, placeholder: &str) -> Result<(), MapperError> {
        self.entry_mut(placeholder)?.selected = None;
        Ok(())
    }

    pub fn unresolved(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.selected.is_none())
            .map(|e| e.placeholder.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.selected.is_some())
    }

    /// Mapping for the completion request: already-valid tokens plus every repair.
    pub fn into_mappings(self) -> Result<TemplateFieldMapping, MapperError> {
        let unresolved: Vec<String> = self.unresolved().into_iter().map(str::to_string).collect();
        if !unresolved.is_empty() {
            return Err(MapperError::Incomplete(unresolved));
        }
        let mut mapping = self.accepted;
        for entry in self.entries {
            if let Some(field) = entry.selected {
                mapping.insert(entry.placeholder, field);
            }
        }
        Ok(mapping)
    }

    fn entry_mut(&mut self, placeholder: &str) -> Result<&mut RepairEntry, MapperError> {
        self.entries
            .iter_mut()
            .find(|e| e.placeholder == placeholder)
            .ok_or_else(|| MapperError::UnknownPlaceholder(placeholder.to_string()))
    }
}
