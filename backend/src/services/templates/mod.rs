//! # Template Service Module
//!
//! This module aggregates all API endpoints related to document templates:
//! uploading a `.docx`, repairing its placeholders, reading it back and
//! persisting the bindings produced by the field mapper.
//!
//! ## Sub-modules:
//! - `extract`: pulls `{name}` tokens out of an uploaded document.
//! - `convert`: turns the document body into template HTML.
//! - `suggest`: optional AI suggestions for tokens the rules cannot place.
//! - `record`: `TemplateRecord` <-> `templates` row conversions.
//! - `upload` / `complete`: the upload pipeline and its repair resubmission.
//! - `get`: retrieval of a single template.
//! - `save`: field-mapping persistence.
//! - `validation`: re-validation of a stored mapping.

pub mod complete;
pub mod convert;
pub mod extract;
pub mod get;
pub mod record;
pub mod save;
pub mod suggest;
pub mod upload;
pub mod validation;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

/// The base path for all template-related API endpoints.
const API_PATH: &str = "/api/templates";

/// Configures and returns the Actix `Scope` for all template-related routes.
///
/// # Registered Routes:
///
/// *   **`POST /upload`**:
///     - **Handler**: `upload::process`
///     - **Description**: Multipart upload (`json` + `file`). Returns the new
///       `TemplateRecord`, or `422` with `{ blockUpload, validation }` when a
///       placeholder does not resolve to a known field.
///
/// *   **`POST /upload/complete`**:
///     - **Handler**: `complete::process`
///     - **Description**: Resubmits a blocked upload (base64 file) with the
///       repaired token -> field mappings.
///
/// *   **`GET /{template_id}`**:
///     - **Handler**: `get::process`
///     - **Description**: Returns the stored template.
///
/// *   **`POST /{template_id}/mappings`**:
///     - **Handler**: `save::process`
///     - **Description**: Persists edited HTML and its bindings; `409` until
///       unknown fields are confirmed.
///
/// *   **`GET /{template_id}/validation`**:
///     - **Handler**: `validation::process`
///     - **Description**: Validates the stored mapping against the current schema.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/upload/complete", post().to(complete::process))
        .route("/{template_id}", get().to(get::process))
        .route("/{template_id}/mappings", post().to(save::process))
        .route("/{template_id}/validation", get().to(validation::process))
}
