//! SQLite-backed [`RelationalStore`].
//!
//! A single `rusqlite::Connection` behind a mutex. Table and column names are
//! interpolated into SQL, so every identifier is checked against
//! `[A-Za-z_][A-Za-z0-9_]*` first; values always travel as bound parameters.
//!
//! JSON arrays and objects are stored as text and handed back as strings;
//! callers that persist structured columns decode them themselves.

use super::{Filter, RelationalStore, Row, StorageError};
use log::{debug, info};
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::{LazyLock, Mutex, MutexGuard};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    city TEXT,
    state TEXT,
    zip_code TEXT,
    date_of_birth TEXT,
    trust_name TEXT,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS custom_placeholders (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    label TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    field_type TEXT NOT NULL DEFAULT 'text',
    created_at TEXT
);
CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    html_content TEXT NOT NULL,
    field_mappings TEXT NOT NULL DEFAULT '{}',
    detected_placeholders TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'draft',
    document_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    template_id TEXT,
    title TEXT NOT NULL DEFAULT '',
    custom_field_values TEXT NOT NULL DEFAULT '{}',
    created_at TEXT
);
CREATE TABLE IF NOT EXISTS generated_documents (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    template_id TEXT NOT NULL,
    path TEXT NOT NULL,
    unresolved TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        info!("Opened SQLite database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Unavailable)
    }
}

impl RelationalStore for SqliteStore {
    fn select(&self, table: &str, filter: Filter<'_>) -> Result<Vec<Row>, StorageError> {
        let (clause, params) = where_clause(filter, 1)?;
        let sql = format!("SELECT * FROM {}{}", identifier(table)?, clause);
        debug!("{}", sql);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), from_sql(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn insert(&self, table: &str, row: &Row) -> Result<(), StorageError> {
        let columns = row
            .keys()
            .map(|c| identifier(c))
            .collect::<Result<Vec<_>, _>>()?;
        let marks: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            identifier(table)?,
            columns.join(", "),
            marks.join(", ")
        );
        let params: Vec<SqlValue> = row.values().map(to_sql).collect();
        self.lock()?.execute(&sql, params_from_iter(params))?;
        Ok(())
    }

    fn update(&self, table: &str, filter: Filter<'_>, changes: &Row) -> Result<usize, StorageError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut assignments = Vec::with_capacity(changes.len());
        let mut params: Vec<SqlValue> = Vec::with_capacity(changes.len() + filter.len());
        for (i, (column, value)) in changes.iter().enumerate() {
            assignments.push(format!("{} = ?{}", identifier(column)?, i + 1));
            params.push(to_sql(value));
        }
        let (clause, filter_params) = where_clause(filter, changes.len() + 1)?;
        params.extend(filter_params);
        let sql = format!(
            "UPDATE {} SET {}{}",
            identifier(table)?,
            assignments.join(", "),
            clause
        );
        Ok(self.lock()?.execute(&sql, params_from_iter(params))?)
    }

    fn delete(&self, table: &str, filter: Filter<'_>) -> Result<usize, StorageError> {
        let (clause, params) = where_clause(filter, 1)?;
        let sql = format!("DELETE FROM {}{}", identifier(table)?, clause);
        Ok(self.lock()?.execute(&sql, params_from_iter(params))?)
    }

    fn query_columns(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let sql = format!("PRAGMA table_info({})", identifier(table)?);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(StorageError::NotFound(format!("table {}", table)));
        }
        Ok(columns)
    }
}

fn identifier(name: &str) -> Result<&str, StorageError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

/// Builds ` WHERE a = ?n AND b = ?n+1` with parameters numbered from `first`.
fn where_clause(filter: Filter<'_>, first: usize) -> Result<(String, Vec<SqlValue>), StorageError> {
    if filter.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut conditions = Vec::with_capacity(filter.len());
    let mut params = Vec::with_capacity(filter.len());
    for (i, (column, value)) in filter.iter().enumerate() {
        conditions.push(format!("{} = ?{}", identifier(column)?, first + i));
        params.push(to_sql(value));
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
