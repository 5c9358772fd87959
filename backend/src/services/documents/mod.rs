//! # Document Service Module
//!
//! Produces finished documents from templates and task data.
//!
//! ## Sub-modules:
//! - `generate`: populates one task's template and stores the result.
//! - `batch`: background generation for many tasks, reported through the job controller.
//! - `get_status`: polling endpoint for batch jobs.
//! - `pdf`: PDF rendering of a stored document.

pub mod batch;
pub mod generate;
mod get_status;
pub mod pdf;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

/// The base path for all document-related API endpoints.
const API_PATH: &str = "/api/documents";

/// Configures and returns the Actix `Scope` for document routes.
///
/// # Registered Routes:
///
/// *   **`POST /generate`**: `{ task_id, template_id? }`; returns the populated
///     HTML, unresolved tokens and a signed download URL.
/// *   **`POST /batch`**: `{ template_id, task_ids }`; returns a `job_id`.
/// *   **`GET /jobs/{job_id}`**: the batch job's `JobStatus`.
/// *   **`GET /{document_id}/pdf`**: the document rendered as an inline PDF.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/generate", post().to(generate::process))
        .route("/batch", post().to(batch::process))
        .route("/jobs/{job_id}", get().to(get_status::process))
        .route("/{document_id}/pdf", get().to(pdf::process))
}
