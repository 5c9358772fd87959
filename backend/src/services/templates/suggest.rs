//! Optional AI-assisted mapping suggestions.
//!
//! A [`SuggestionService`] proposes fields for tokens the rule-based matcher
//! could not place. Its answers are advisory: [`merge_suggestions`] only fills
//! suggestions that are still empty, only with fields the registry knows, and
//! only above a confidence floor. Any failure of the service is logged and the
//! validation is returned unchanged.

use common::model::validation::ValidationResult;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub placeholder: String,
    pub field: String,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),
}

pub trait SuggestionService: Send + Sync {
    /// Proposes fields for `tokens`, given the document's plain text as context.
    fn suggest_mappings(
        &self,
        text: &str,
        tokens: &[String],
    ) -> Result<Vec<AiSuggestion>, SuggestionError>;
}

/// The default service: never suggests anything.
pub struct DisabledSuggestions;

impl SuggestionService for DisabledSuggestions {
    fn suggest_mappings(
        &self,
        _text: &str,
        _tokens: &[String],
    ) -> Result<Vec<AiSuggestion>, SuggestionError> {
        Err(SuggestionError::Unavailable("not configured".to_string()))
    }
}

/// Asks `service` about every invalid token lacking a suggestion and merges
/// acceptable answers into `validation`.
pub fn enrich_validation(
    service: &dyn SuggestionService,
    validation: &mut ValidationResult,
    plain_text: &str,
    known_fields: &HashSet<String>,
    min_confidence: f64,
) {
    let open: Vec<String> = validation
        .invalid_mappings
        .iter()
        .filter(|m| m.suggestion.is_none())
        .map(|m| m.placeholder.clone())
        .collect();
    if open.is_empty() {
        return;
    }
    match service.suggest_mappings(plain_text, &open) {
        Ok(suggestions) => {
            let merged = merge_suggestions(validation, &suggestions, known_fields, min_confidence);
            info!("Merged {} AI suggestion(s)", merged);
        }
        Err(e) => warn!("Skipping AI suggestions: {}", e),
    }
}

/// Returns how many suggestions were applied.
pub fn merge_suggestions(
    validation: &mut ValidationResult,
    suggestions: &[AiSuggestion],
    known_fields: &HashSet<String>,
    min_confidence: f64,
) -> usize {
    let mut applied = 0;
    for invalid in validation
        .invalid_mappings
        .iter_mut()
        .filter(|m| m.suggestion.is_none())
    {
        let best = suggestions
            .iter()
            .filter(|s| s.placeholder == invalid.placeholder)
            .filter(|s| s.confidence >= min_confidence && known_fields.contains(&s.field))
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        if let Some(suggestion) = best {
            invalid.suggestion = Some(suggestion.field.clone());
            applied += 1;
        }
    }
    applied
}
