//! Field-name matching heuristics.
//!
//! Two consumers share these rules:
//!
//! - Validation (`suggest_field`) proposes a replacement for a placeholder whose
//!   field is unknown: exact case-insensitive match, then substring containment in
//!   either direction, then the alias table.
//! - Population (`similar_key`) rescues leftover tokens by normalized edit
//!   distance or containment before they are marked missing.
//!
//! Thresholds and aliases are heuristics, so they live in [`MatchConfig`]
//! rather than being hard-wired into the algorithms.

use std::collections::HashMap;

/// Similarity ratio a leftover token must exceed to borrow another key's value.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Shortest string allowed to take part in a containment match.
pub const MIN_CONTAINMENT_LEN: usize = 3;

/// Common names operators use for fields that exist under another key.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("name", "full_name"),
    ("client_name", "full_name"),
    ("clientname", "full_name"),
    ("fullname", "full_name"),
    ("firstname", "first_name"),
    ("given_name", "first_name"),
    ("lastname", "last_name"),
    ("surname", "last_name"),
    ("family_name", "last_name"),
    ("mail", "email"),
    ("e_mail", "email"),
    ("email_address", "email"),
    ("phone_number", "phone"),
    ("telephone", "phone"),
    ("tel", "phone"),
    ("mobile", "phone"),
    ("date", "current_date"),
    ("today", "current_date"),
    ("todays_date", "current_date"),
    ("year", "current_year"),
    ("zip", "zip_code"),
    ("zipcode", "zip_code"),
    ("postal_code", "zip_code"),
    ("postcode", "zip_code"),
    ("dob", "date_of_birth"),
    ("birthday", "date_of_birth"),
    ("birth_date", "date_of_birth"),
    ("street", "address"),
    ("street_address", "address"),
    ("province", "state"),
];

/// Tunable parameters for the matching heuristics.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub similarity_threshold: f64,
    pub min_containment_len: usize,
    /// Normalized alias -> target field name.
    pub aliases: HashMap<String, String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_containment_len: MIN_CONTAINMENT_LEN,
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(alias, target)| (alias.to_string(), target.to_string()))
                .collect(),
        }
    }
}

impl MatchConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// Suggests a known field for an unknown `name`, or `None` when nothing plausible exists.
///
/// Rules are tried in order and the first hit wins:
/// 1. exact match ignoring case;
/// 2. substring containment either way (closest length wins);
/// 3. the alias table, when its target is one of `candidates`.
pub fn suggest_field(name: &str, candidates: &[&str], config: &MatchConfig) -> Option<String> {
    let wanted = name.trim();
    if wanted.is_empty() {
        return None;
    }

    if let Some(exact) = candidates.iter().find(|c| c.eq_ignore_ascii_case(wanted)) {
        return Some(exact.to_string());
    }

    let lowered = wanted.to_lowercase();
    let contained = candidates
        .iter()
        .filter(|c| contains_either_way(&lowered, &c.to_lowercase(), config.min_containment_len))
        .min_by_key(|c| c.len().abs_diff(lowered.len()));
    if let Some(candidate) = contained {
        return Some(candidate.to_string());
    }

    let alias_target = config.aliases.get(&to_snake_case(wanted))?;
    candidates
        .iter()
        .find(|c| c.eq_ignore_ascii_case(alias_target))
        .map(|c| c.to_string())
}

/// Finds the key most similar to `token`, for the populator's fuzzy pass.
///
/// Both sides are snake_case-normalized. A key qualifies when the Levenshtein
/// ratio exceeds the threshold or one string contains the other; the highest
/// score wins and earlier keys win ties.
pub fn similar_key<'a>(token: &str, keys: &[&'a str], config: &MatchConfig) -> Option<&'a str> {
    let normalized = to_snake_case(token);
    if normalized.is_empty() {
        return None;
    }

    let mut best: Option<(&'a str, f64)> = None;
    for key in keys {
        let candidate = to_snake_case(key);
        if candidate.is_empty() {
            continue;
        }
        let ratio = similarity(&normalized, &candidate);
        let score = if ratio > config.similarity_threshold {
            ratio
        } else if contains_either_way(&normalized, &candidate, config.min_containment_len) {
            let (short, long) = ordered_lengths(&normalized, &candidate);
            ratio.max(short as f64 / long as f64)
        } else {
            continue;
        };
        if best.is_none_or(|(_, current)| score > current) {
            best = Some((key, score));
        }
    }
    best.map(|(key, _)| key)
}

/// Normalized similarity in `[0, 1]`: `1 - distance / longest length`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];
    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

/// Normalizes `ClientName`, `client-name` and `Client Name` to `client_name`.
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in input.trim().chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower_or_digit && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn contains_either_way(a: &str, b: &str, min_len: usize) -> bool {
    let (short, _) = ordered_lengths(a, b);
    if short < min_len {
        return false;
    }
    a.contains(b) || b.contains(a)
}

fn ordered_lengths(a: &str, b: &str) -> (usize, usize) {
    let (la, lb) = (a.chars().count(), b.chars().count());
    (la.min(lb), la.max(lb))
}
