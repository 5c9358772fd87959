//! # Schema Registry
//!
//! Answers "which data fields exist?" for the rest of the pipeline. Fields come
//! from three sources, merged into one namespace where the first definition of
//! a name wins:
//!
//! 1. Columns of the `clients` table. Discovery asks the store for the column
//!    list; if that fails it infers columns from the keys of a sample row; if
//!    that yields nothing too, a built-in default list is used. System columns
//!    (`id`, `created_at`, `updated_at`, `user_id`) are never exposed.
//! 2. Operator-defined rows of `custom_placeholders`.
//! 3. Computed fields (`full_name`, `current_date`, `current_year`, `full_address`).
//!
//! The discovered column list is cached per registry with a TTL;
//! [`SchemaRegistry::invalidate`] drops it immediately. Store reads run on the
//! blocking pool.

use crate::storage::{RelationalStore, StorageError};
use common::matching::{suggest_field, MatchConfig};
use common::model::field::{FieldDescriptor, FieldSource};
use common::model::mapping::{normalize_literal, TemplateFieldMapping};
use common::model::validation::{InvalidMapping, ValidPlaceholder, ValidationResult};
use log::{debug, info, warn};
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const CLIENTS_TABLE: &str = "clients";
pub const CUSTOM_PLACEHOLDERS_TABLE: &str = "custom_placeholders";

/// Columns that belong to the record's bookkeeping, not to the client.
pub const SYSTEM_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "user_id"];

/// Used when neither the catalog nor a sample row reveals the client columns.
pub const DEFAULT_CLIENT_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "zip_code",
    "date_of_birth",
    "trust_name",
];

const COMPUTED_FIELDS: &[(&str, &str, &str)] = &[
    ("full_name", "Full Name", "First and last name joined by a space"),
    ("current_date", "Current Date", "Generation date, e.g. October 16, 2026"),
    ("current_year", "Current Year", "Four-digit year of generation"),
    (
        "full_address",
        "Full Address",
        "Address, city, state and zip code on one line",
    ),
];

pub struct SchemaRegistry {
    store: Arc<dyn RelationalStore>,
    columns: Cache<String, Arc<Vec<String>>>,
    matching: MatchConfig,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn RelationalStore>, ttl: Duration, matching: MatchConfig) -> Self {
        Self {
            store,
            columns: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
            matching,
        }
    }

    /// Every field currently available for substitution, in source priority.
    pub async fn list_fields(&self) -> Result<Vec<FieldDescriptor>, StorageError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        let mut push = |field: FieldDescriptor| {
            if seen.insert(field.name.clone()) {
                fields.push(field);
            }
        };

        for column in self.client_columns().await?.iter() {
            push(FieldDescriptor::client(column, humanize(column), categorize(column)));
        }
        let store = self.store.clone();
        let custom = tokio::task::spawn_blocking(move || store.select(CUSTOM_PLACEHOLDERS_TABLE, &[]))
            .await
            .map_err(|e| {
                warn!("Listing {} failed: {}", CUSTOM_PLACEHOLDERS_TABLE, e);
                StorageError::Unavailable
            })??;
        for row in custom {
            let Some(name) = row.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let text = |key: &str| {
                row.get(key)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let label = Some(text("label"))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| humanize(name));
            push(FieldDescriptor {
                name: name.to_string(),
                label,
                description: text("description"),
                category: "Custom".to_string(),
                computed: false,
                custom: true,
                source: FieldSource::Placeholder,
            });
        }
        for (name, label, description) in COMPUTED_FIELDS {
            push(FieldDescriptor::computed(name, label, description));
        }

        debug!("Schema registry lists {} fields", fields.len());
        Ok(fields)
    }

    pub async fn field_names(&self) -> Result<HashSet<String>, StorageError> {
        Ok(self
            .list_fields()
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect())
    }

    /// Checks every `literal -> field` binding against the registry.
    pub async fn validate(&self, mapping: &TemplateFieldMapping) -> Result<ValidationResult, StorageError> {
        let names = self.field_names().await?;
        Ok(self.validate_against(mapping, &names))
    }

    /// Validates bare tokens, each bound to the field of the same name.
    pub async fn reconcile<I, S>(&self, tokens: I) -> Result<ValidationResult, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mapping: TemplateFieldMapping = tokens
            .into_iter()
            .map(|t| {
                let token = normalize_literal(t.as_ref()).to_string();
                (token.clone(), token)
            })
            .collect();
        self.validate(&mapping).await
    }

    /// Same as [`Self::validate`] for a field set the caller already holds.
    pub fn validate_against(
        &self,
        mapping: &TemplateFieldMapping,
        names: &HashSet<String>,
    ) -> ValidationResult {
        let mut candidates: Vec<&str> = names.iter().map(String::as_str).collect();
        candidates.sort_unstable();

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for (literal, field) in mapping {
            let placeholder = normalize_literal(literal).to_string();
            let field = field.trim();
            if names.contains(field) {
                valid.push(ValidPlaceholder {
                    name: placeholder,
                    field: field.to_string(),
                });
            } else {
                invalid.push(InvalidMapping {
                    placeholder,
                    field_name: field.to_string(),
                    suggestion: suggest_field(field, &candidates, &self.matching),
                });
            }
        }
        ValidationResult::from_parts(valid, invalid)
    }

    /// Drops the cached column catalog; the next query rediscovers it.
    pub fn invalidate(&self) {
        self.columns.invalidate_all();
        info!("Schema cache invalidated");
    }

    async fn client_columns(&self) -> Result<Arc<Vec<String>>, StorageError> {
        let store = self.store.clone();
        self.columns
            .try_get_with(CLIENTS_TABLE.to_string(), async move {
                tokio::task::spawn_blocking(move || discover_client_columns(store.as_ref()))
                    .await
                    .map(Arc::new)
            })
            .await
            .map_err(|e| {
                warn!("Column discovery task failed: {}", e);
                StorageError::Unavailable
            })
    }
}

/// Catalog first, then a sample row, then the default list.
fn discover_client_columns(store: &dyn RelationalStore) -> Vec<String> {
    let exposed = |columns: Vec<String>| -> Vec<String> {
        columns
            .into_iter()
            .filter(|c| !SYSTEM_COLUMNS.contains(&c.as_str()))
            .collect()
    };

    match store.query_columns(CLIENTS_TABLE) {
        Ok(columns) if !columns.is_empty() => return exposed(columns),
        Ok(_) => warn!("Column catalog for {} is empty", CLIENTS_TABLE),
        Err(e) => warn!("Column discovery for {} failed: {}", CLIENTS_TABLE, e),
    }

    match store.select(CLIENTS_TABLE, &[]) {
        Ok(rows) => {
            if let Some(sample) = rows.into_iter().next() {
                let columns = exposed(sample.keys().cloned().collect());
                if !columns.is_empty() {
                    warn!("Inferred {} client columns from a sample row", columns.len());
                    return columns;
                }
            }
        }
        Err(e) => warn!("Sampling {} failed: {}", CLIENTS_TABLE, e),
    }

    warn!("Falling back to the default client column list");
    DEFAULT_CLIENT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// `date_of_birth` -> `Date Of Birth`.
pub fn humanize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assigns a display category from the column name.
pub fn categorize(name: &str) -> &'static str {
    let name = name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));
    if has(&["trust", "trustee", "beneficiar", "grantor", "settlor"]) {
        "Trust"
    } else if has(&["email", "phone", "mobile", "fax", "contact"]) {
        "Contact"
    } else if has(&["address", "street", "city", "state", "zip", "postal", "country"]) {
        "Address"
    } else if has(&["income", "asset", "balance", "amount", "account", "net_worth", "salary", "tax"]) {
        "Financial"
    } else if has(&["name", "birth", "dob", "gender", "marital", "ssn", "age"]) {
        "Personal"
    } else {
        "Client"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStore;
    use crate::storage::{Filter, Row};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn registry(store: Arc<dyn RelationalStore>) -> SchemaRegistry {
        SchemaRegistry::new(store, Duration::from_secs(300), MatchConfig::default())
    }

    /// A store whose catalog is unavailable.
    struct NoCatalog {
        rows: Vec<Row>,
    }

    impl RelationalStore for NoCatalog {
        fn select(&self, table: &str, _filter: Filter<'_>) -> Result<Vec<Row>, StorageError> {
            if table == CLIENTS_TABLE {
                Ok(self.rows.clone())
            } else {
                Ok(Vec::new())
            }
        }
        fn insert(&self, _table: &str, _row: &Row) -> Result<(), StorageError> {
            Ok(())
        }
        fn update(&self, _t: &str, _f: Filter<'_>, _c: &Row) -> Result<usize, StorageError> {
            Ok(0)
        }
        fn delete(&self, _t: &str, _f: Filter<'_>) -> Result<usize, StorageError> {
            Ok(0)
        }
        fn query_columns(&self, table: &str) -> Result<Vec<String>, StorageError> {
            Err(StorageError::NotFound(table.to_string()))
        }
    }

    #[actix_web::test]
    async fn fields_merge_client_custom_and_computed() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert(
                CUSTOM_PLACEHOLDERS_TABLE,
                &json!({"id": "p1", "name": "trust_name", "label": "Shadowed", "field_type": "text"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        store
            .insert(
                CUSTOM_PLACEHOLDERS_TABLE,
                &json!({"id": "p2", "name": "case_number", "label": "", "field_type": "text"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();

        let fields = registry(store).list_fields().await.unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert!(!names.contains(&"id"));
        assert!(!names.contains(&"user_id"));
        assert!(!names.contains(&"created_at"));

        let trust = fields.iter().find(|f| f.name == "trust_name").unwrap();
        assert_eq!(trust.source, FieldSource::Client);
        assert_eq!(trust.category, "Trust");

        let custom = fields.iter().find(|f| f.name == "case_number").unwrap();
        assert!(custom.custom);
        assert_eq!(custom.label, "Case Number");

        let computed: Vec<&str> = fields
            .iter()
            .filter(|f| f.computed)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            computed,
            vec!["full_name", "current_date", "current_year", "full_address"]
        );
    }

    #[actix_web::test]
    async fn columns_fall_back_to_a_sample_row() {
        let rows = vec![json!({"id": "c1", "nickname": "JJ", "user_id": "u"})
            .as_object()
            .cloned()
            .unwrap()];
        let names = registry(Arc::new(NoCatalog { rows })).field_names().await.unwrap();
        assert!(names.contains("nickname"));
        assert!(!names.contains("email"));
        assert!(!names.contains("id"));
    }

    #[actix_web::test]
    async fn columns_fall_back_to_defaults() {
        let names = registry(Arc::new(NoCatalog { rows: Vec::new() }))
            .field_names()
            .await
            .unwrap();
        for column in DEFAULT_CLIENT_COLUMNS {
            assert!(names.contains(*column));
        }
    }

    #[actix_web::test]
    async fn reconcile_partitions_tokens_with_suggestions() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let result = registry(store)
            .reconcile(["first_name", "unknown_field", "mail"])
            .await
            .unwrap();

        assert_eq!(result.valid_count, 1);
        assert_eq!(result.invalid_count, 2);
        assert_eq!(result.total(), 3);
        let suggestion = |p: &str| {
            result
                .invalid_mappings
                .iter()
                .find(|m| m.placeholder == p)
                .and_then(|m| m.suggestion.clone())
        };
        assert_eq!(suggestion("unknown_field"), None);
        assert_eq!(suggestion("mail").as_deref(), Some("email"));
    }

    /// A store whose column catalog can change while the registry holds a cached copy.
    struct MutableCatalog {
        columns: Mutex<Vec<String>>,
        discoveries: AtomicUsize,
    }

    impl RelationalStore for MutableCatalog {
        fn select(&self, _table: &str, _filter: Filter<'_>) -> Result<Vec<Row>, StorageError> {
            Ok(Vec::new())
        }
        fn insert(&self, _table: &str, _row: &Row) -> Result<(), StorageError> {
            Ok(())
        }
        fn update(&self, _t: &str, _f: Filter<'_>, _c: &Row) -> Result<usize, StorageError> {
            Ok(0)
        }
        fn delete(&self, _t: &str, _f: Filter<'_>) -> Result<usize, StorageError> {
            Ok(0)
        }
        fn query_columns(&self, _table: &str) -> Result<Vec<String>, StorageError> {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            Ok(self.columns.lock().unwrap().clone())
        }
    }

    #[actix_web::test]
    async fn client_columns_are_cached_until_invalidated() {
        let store = Arc::new(MutableCatalog {
            columns: Mutex::new(vec!["id".into(), "first_name".into()]),
            discoveries: AtomicUsize::new(0),
        });
        let registry = registry(store.clone());
        assert!(registry.field_names().await.unwrap().contains("first_name"));

        store.columns.lock().unwrap().push("spouse_name".into());
        assert!(!registry.field_names().await.unwrap().contains("spouse_name"));
        assert_eq!(store.discoveries.load(Ordering::SeqCst), 1);

        registry.invalidate();
        assert!(registry.field_names().await.unwrap().contains("spouse_name"));
        assert_eq!(store.discoveries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn labels_and_categories() {
        assert_eq!(humanize("date_of_birth"), "Date Of Birth");
        assert_eq!(categorize("zip_code"), "Address");
        assert_eq!(categorize("email"), "Contact");
        assert_eq!(categorize("account_balance"), "Financial");
        assert_eq!(categorize("first_name"), "Personal");
        assert_eq!(categorize("occupation"), "Client");
    }
}
