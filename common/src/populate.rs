//! Document population: substitutes client and task data into template HTML.
//!
//! Values are resolved per field name in this priority:
//!
//! 1. task-specific custom field values (exact key, lowercase, snake_case);
//! 2. fields built from the current client record (every non-null column);
//! 3. computed fields (`full_name`, `current_date`, `current_year`, `full_address`);
//! 4. the template's literal -> field mapping, resolved through the same chain.
//!
//! Substitution runs twice. The first pass replaces every token that resolves
//! exactly. The second pass retries leftovers against all known keys by
//! similarity and replaces whatever still fails with `[MISSING: TOKEN]`, so a
//! generated document never carries a raw `{{token}}`.

use crate::helpers::escape_html;
use crate::matching::{similar_key, to_snake_case, MatchConfig};
use crate::model::mapping::{normalize_literal, TemplateFieldMapping};
use chrono::{Datelike, Local, NaiveDate};
use log::warn;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// `{{name}}` wrapped in an inline `<span>`/`<mark>` (including `field-placeholder` markers).
static WRAPPED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:span|mark)\b[^>]*>\s*\{\{\s*([^{}<>]+?)\s*\}\}\s*</(?:span|mark)>")
        .expect("wrapped token regex")
});

/// A bare `{{name}}` token.
static BARE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}<>]+?)\s*\}\}").expect("bare token regex"));

/// Format used for `current_date`, e.g. `October 16, 2026`.
pub const DATE_FORMAT: &str = "%B %-d, %Y";

/// A leftover token that borrowed the value of a similar key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzyMatch {
    pub token: String,
    pub key: String,
}

/// Output of a population run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Populated {
    pub html: String,
    /// Tokens replaced by a `[MISSING: ...]` sentinel.
    pub unresolved: Vec<String>,
    pub fuzzy: Vec<FuzzyMatch>,
}

/// Fully resolved value table for one document.
#[derive(Debug, Clone, Default)]
pub struct ResolvedValues {
    values: BTreeMap<String, String>,
}

impl ResolvedValues {
    /// Inserts unless a higher-priority source already claimed the key.
    fn offer(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        self.values
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Exact key, then lowercase, then snake_case.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let name = normalize_literal(name);
        self.values
            .get(name)
            .or_else(|| self.values.get(&name.to_lowercase()))
            .or_else(|| self.values.get(&to_snake_case(name)))
            .map(String::as_str)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Substitutes data into template HTML.
///
/// Holds no per-document state, so one instance can serve concurrent
/// generations.
#[derive(Debug, Clone)]
pub struct Populator {
    config: MatchConfig,
    today: Option<NaiveDate>,
}

impl Default for Populator {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl Populator {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            today: None,
        }
    }

    /// Pins the date used for `current_date` / `current_year`.
    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Builds the value table following the resolution priority.
    pub fn resolve_values(
        &self,
        mapping: &TemplateFieldMapping,
        client: &Map<String, Value>,
        custom_values: &HashMap<String, String>,
    ) -> ResolvedValues {
        let mut resolved = ResolvedValues::default();

        let mut custom: Vec<(&String, &String)> = custom_values.iter().collect();
        custom.sort();
        for (key, value) in &custom {
            resolved.offer(key, value);
        }
        for (key, value) in &custom {
            resolved.offer(&key.to_lowercase(), value);
            resolved.offer(&to_snake_case(key), value);
        }

        for (column, value) in client {
            if let Some(text) = render_value(value) {
                resolved.offer(column, &text);
            }
        }

        for (key, value) in computed_values(client, self.today()) {
            resolved.offer(key, &value);
        }

        for (literal, field) in mapping {
            let literal = normalize_literal(literal);
            if resolved.lookup(literal).is_some() {
                continue;
            }
            if let Some(value) = resolved.lookup(field).map(str::to_string) {
                resolved.offer(literal, &value);
            }
        }

        resolved
    }

    /// Replaces every placeholder in `html`.
    ///
    /// Bare, generically wrapped and `field-placeholder` wrapped tokens resolve to
    /// the same value and lose their wrapper.
    pub fn populate(
        &self,
        html: &str,
        mapping: &TemplateFieldMapping,
        client: &Map<String, Value>,
        custom_values: &HashMap<String, String>,
    ) -> Populated {
        let resolved = self.resolve_values(mapping, client, custom_values);
        self.populate_with(html, &resolved)
    }

    pub fn populate_with(&self, html: &str, resolved: &ResolvedValues) -> Populated {
        let exact = |caps: &Captures| match resolved.lookup(&caps[1]) {
            Some(value) => escape_value(value),
            None => caps[0].to_string(),
        };
        let html = WRAPPED_TOKEN.replace_all(html, exact).into_owned();
        let html = BARE_TOKEN.replace_all(&html, exact).into_owned();

        let keys = resolved.keys();
        let mut unresolved = Vec::new();
        let mut fuzzy = Vec::new();
        let mut fallback = |caps: &Captures| {
            let token = caps[1].trim().to_string();
            match similar_key(&token, &keys, &self.config).and_then(|key| {
                resolved.lookup(key).map(|value| (key, value))
            }) {
                Some((key, value)) => {
                    warn!("Placeholder '{}' resolved by similarity to '{}'", token, key);
                    fuzzy.push(FuzzyMatch {
                        token,
                        key: key.to_string(),
                    });
                    escape_value(value)
                }
                None => {
                    warn!("Placeholder '{}' has no value; marking it missing", token);
                    let sentinel = missing_sentinel(&token);
                    unresolved.push(token);
                    sentinel
                }
            }
        };
        let html = WRAPPED_TOKEN.replace_all(&html, &mut fallback).into_owned();
        let html = BARE_TOKEN.replace_all(&html, &mut fallback).into_owned();

        Populated {
            html,
            unresolved,
            fuzzy,
        }
    }
}

/// Populates with the default heuristics and today's date.
pub fn populate(
    html: &str,
    mapping: &TemplateFieldMapping,
    client: &Map<String, Value>,
    custom_values: &HashMap<String, String>,
) -> Populated {
    Populator::default().populate(html, mapping, client, custom_values)
}

/// The conspicuous marker left where no value could be found.
pub fn missing_sentinel(token: &str) -> String {
    format!("[MISSING: {}]", token.trim().to_uppercase())
}

/// Formats a date the way `current_date` renders.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn computed_values(client: &Map<String, Value>, today: NaiveDate) -> Vec<(&'static str, String)> {
    let text = |key: &str| client.get(key).and_then(render_value).unwrap_or_default();
    let mut computed = Vec::new();

    let full_name = [text("first_name"), text("last_name")]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.trim())
        .collect::<Vec<_>>()
        .join(" ");
    if !full_name.is_empty() {
        computed.push(("full_name", full_name));
    }

    computed.push(("current_date", format_date(today)));
    computed.push(("current_year", today.year().to_string()));

    let locality = [text("state"), text("zip_code")]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let address = [text("address"), text("city"), locality]
        .iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if !address.is_empty() {
        computed.push(("full_address", address));
    }

    computed
}

/// Renders a client column as document text; `None` for nulls and objects.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_value).collect();
            Some(parts.join(", "))
        }
    }
}

/// HTML-escapes a value and neutralizes braces so it can never form a token.
fn escape_value(value: &str) -> String {
    escape_html(value).replace('{', "&#123;").replace('}', "&#125;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn custom_values_outrank_client_columns() {
        let populator = Populator::default().on(day());
        let custom = HashMap::from([("Trust_Name".to_string(), "Doe Family Trust".to_string())]);
        let client = client(json!({"trust_name": "Old Trust", "first_name": "Jane"}));
        let resolved = populator.resolve_values(&TemplateFieldMapping::new(), &client, &custom);
        assert_eq!(resolved.lookup("trust_name"), Some("Doe Family Trust"));
        assert_eq!(resolved.lookup("Trust_Name"), Some("Doe Family Trust"));
        assert_eq!(resolved.lookup("first_name"), Some("Jane"));
    }

    #[test]
    fn client_columns_outrank_computed_fields() {
        let populator = Populator::default().on(day());
        let client = client(json!({"first_name": "Jane", "last_name": "Doe", "full_name": "J. Doe"}));
        let resolved = populator.resolve_values(&TemplateFieldMapping::new(), &client, &HashMap::new());
        assert_eq!(resolved.lookup("full_name"), Some("J. Doe"));
        assert_eq!(resolved.lookup("current_year"), Some("2026"));
    }

    #[test]
    fn mapping_literals_resolve_through_the_chain() {
        let populator = Populator::default().on(day());
        let mapping = TemplateFieldMapping::from([("beneficiary".to_string(), "full_name".to_string())]);
        let client = client(json!({"first_name": "Jane", "last_name": "Doe"}));
        let out = populator.populate("To {{beneficiary}}", &mapping, &client, &HashMap::new());
        assert_eq!(out.html, "To Jane Doe");
    }

    #[test]
    fn all_wrapper_shapes_are_unwrapped() {
        let populator = Populator::default().on(day());
        let client = client(json!({"email": "jane@example.com"}));
        let html = concat!(
            "<p>{{email}}|<span>{{email}}</span>|",
            "<span class=\"field-placeholder\" data-field=\"email\" data-instance-id=\"a1\">{{ email }}</span>|",
            "<mark>{{email}}</mark></p>"
        );
        let out = populator.populate(html, &TemplateFieldMapping::new(), &client, &HashMap::new());
        assert_eq!(
            out.html,
            "<p>jane@example.com|jane@example.com|jane@example.com|jane@example.com</p>"
        );
    }

    #[test]
    fn values_are_escaped_and_cannot_reintroduce_tokens() {
        let populator = Populator::default().on(day());
        let client = client(json!({"notes": "<b>{{ssn}}</b> & co"}));
        let out = populator.populate("{{notes}}", &TemplateFieldMapping::new(), &client, &HashMap::new());
        assert_eq!(out.html, "&lt;b&gt;&#123;&#123;ssn&#125;&#125;&lt;/b&gt; &amp; co");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn typos_fall_back_to_similar_keys() {
        let populator = Populator::default().on(day());
        let client = client(json!({"first_name": "Jane"}));
        let out = populator.populate("Hi {{frist_name}}", &TemplateFieldMapping::new(), &client, &HashMap::new());
        assert_eq!(out.html, "Hi Jane");
        assert_eq!(
            out.fuzzy,
            vec![FuzzyMatch {
                token: "frist_name".into(),
                key: "first_name".into()
            }]
        );
    }

    #[test]
    fn null_columns_end_up_missing() {
        let populator = Populator::default().on(day());
        let client = client(json!({"spouse_name": null}));
        let out = populator.populate(
            "<span class=\"field-placeholder\">{{spouse_name}}</span>",
            &TemplateFieldMapping::new(),
            &client,
            &HashMap::new(),
        );
        assert_eq!(out.html, "[MISSING: SPOUSE_NAME]");
        assert_eq!(out.unresolved, vec!["spouse_name".to_string()]);
    }

    #[test]
    fn full_address_joins_present_parts() {
        let populator = Populator::default().on(day());
        let client = client(json!({"address": "1 Main St", "city": "Austin", "state": "TX", "zip_code": 78701}));
        let resolved = populator.resolve_values(&TemplateFieldMapping::new(), &client, &HashMap::new());
        assert_eq!(resolved.lookup("full_address"), Some("1 Main St, Austin, TX 78701"));
    }
}
