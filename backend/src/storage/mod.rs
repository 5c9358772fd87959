//! Storage collaborators.
//!
//! The pipeline only talks to storage through two traits:
//!
//! - [`RelationalStore`]: row-level CRUD on named tables plus column discovery,
//!   used for clients, custom placeholders, templates, tasks and generated
//!   document metadata. Rows travel as JSON objects.
//! - [`ObjectStore`]: blobs addressed by `(bucket, path)`, used for uploaded
//!   `.docx` files and generated documents.
//!
//! Both are synchronous so they can be called from `spawn_blocking` and rayon
//! workers as well as from handlers. The service ships one local implementation
//! of each: [`sqlite::SqliteStore`] and [`local::LocalObjectStore`].

pub mod local;
pub mod sqlite;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// One table row, column name -> value.
pub type Row = Map<String, Value>;

/// Equality conditions, joined with `AND`.
pub type Filter<'a> = &'a [(&'a str, Value)];

/// Bucket holding uploaded template documents.
pub const TEMPLATES_BUCKET: &str = "templates";
/// Bucket holding generated output documents.
pub const DOCUMENTS_BUCKET: &str = "documents";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stored value: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("signature is invalid or expired")]
    BadSignature,

    #[error("storage connection is unavailable")]
    Unavailable,
}

pub trait RelationalStore: Send + Sync {
    fn select(&self, table: &str, filter: Filter<'_>) -> Result<Vec<Row>, StorageError>;

    fn insert(&self, table: &str, row: &Row) -> Result<(), StorageError>;

    /// Applies `changes` to every row matching `filter`; returns the number updated.
    fn update(&self, table: &str, filter: Filter<'_>, changes: &Row) -> Result<usize, StorageError>;

    fn delete(&self, table: &str, filter: Filter<'_>) -> Result<usize, StorageError>;

    /// Column names of `table`, in declaration order.
    fn query_columns(&self, table: &str) -> Result<Vec<String>, StorageError>;

    /// First row matching `filter`, if any.
    fn select_one(&self, table: &str, filter: Filter<'_>) -> Result<Option<Row>, StorageError> {
        Ok(self.select(table, filter)?.into_iter().next())
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub content_type: String,
    /// Overwrite an existing object instead of failing.
    pub upsert: bool,
}

impl StoreOptions {
    pub fn new(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            upsert: false,
        }
    }

    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }
}

pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` and returns the object path.
    fn store(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &StoreOptions,
    ) -> Result<String, StorageError>;

    fn create_signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String, StorageError>;

    fn get_public_url(&self, bucket: &str, path: &str) -> String;

    fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;

    fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Checks a download request. Public buckets need no signature.
    fn verify_signature(
        &self,
        bucket: &str,
        path: &str,
        expires: Option<i64>,
        signature: Option<&str>,
    ) -> Result<(), StorageError>;
}

/// Decodes a structured column.
///
/// Stores may hand JSON back either as a value or as its text encoding; a
/// missing or null column decodes to `T::default()`.
pub fn json_column<T>(row: &Row, column: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match row.get(column) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(T::default()),
        Some(Value::String(text)) => Ok(serde_json::from_str(text)?),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// Text value of `column`, if present and not null.
pub fn text_column(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Rejects paths that could escape their bucket.
pub fn validate_object_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths_stay_inside_their_bucket() {
        assert!(validate_object_path("templates/abc_123.docx").is_ok());
        assert!(validate_object_path("../etc/passwd").is_err());
        assert!(validate_object_path("/abs").is_err());
        assert!(validate_object_path("a//b").is_err());
        assert!(validate_object_path("").is_err());
    }

    #[test]
    fn json_columns_accept_text_or_values() {
        let mut row = Row::new();
        row.insert("a".into(), Value::String(r#"{"k":"v"}"#.into()));
        row.insert("b".into(), serde_json::json!(["x"]));
        row.insert("c".into(), Value::Null);

        let a: std::collections::BTreeMap<String, String> = json_column(&row, "a").unwrap();
        assert_eq!(a["k"], "v");
        let b: Vec<String> = json_column(&row, "b").unwrap();
        assert_eq!(b, vec!["x".to_string()]);
        let c: Vec<String> = json_column(&row, "c").unwrap();
        assert!(c.is_empty());
        assert!(json_column::<Vec<String>>(&row, "a").is_err());
    }
}
