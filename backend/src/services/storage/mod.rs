//! # Storage Download Module
//!
//! Serves objects from the object store to holders of a signed URL, so links
//! handed out by document generation resolve against this service.

mod download;

use crate::storage::local::DOWNLOAD_PREFIX;
use actix_web::web::{get, scope};
use actix_web::Scope;

/// Configures and returns the Actix `Scope` for storage routes.
///
/// # Registered Routes:
///
/// *   **`GET /{bucket}/{path}`**: streams the object when `expires` and
///     `signature` check out (or the bucket is public); `403` otherwise.
pub fn configure_routes() -> Scope {
    scope(DOWNLOAD_PREFIX).route("/{bucket}/{path:.*}", get().to(download::process))
}
