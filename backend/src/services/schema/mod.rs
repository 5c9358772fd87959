//! # Schema Service Module
//!
//! Exposes the schema registry over HTTP under `/api/schema`.
//!
//! ## Sub-modules:
//! - `registry`: field discovery, validation and the column cache.
//! - `fields`: list fields, validate a mapping, force a refresh.
//! - `placeholders`: CRUD for operator-defined custom placeholders.

pub mod fields;
pub mod placeholders;
pub mod registry;

use actix_web::web::{delete, get, post, scope};
use actix_web::Scope;

/// The base path for all schema-related API endpoints.
const API_PATH: &str = "/api/schema";

/// Configures and returns the Actix `Scope` for schema routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**: every `FieldDescriptor` currently available.
/// *   **`POST /`**: validates a `{ literal: field }` mapping, returns a `ValidationResult`.
/// *   **`POST /refresh`**: drops the cached column catalog.
/// *   **`GET /placeholders`**: lists custom placeholders.
/// *   **`POST /placeholders`**: creates a custom placeholder; invalidates the cache.
/// *   **`DELETE /placeholders/{id}`**: deletes one; invalidates the cache.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(fields::list))
        .route("", post().to(fields::validate))
        .route("/refresh", post().to(fields::refresh))
        .route("/placeholders", get().to(placeholders::list))
        .route("/placeholders", post().to(placeholders::create))
        .route("/placeholders/{id}", delete().to(placeholders::remove))
}
