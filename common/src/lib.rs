//! Shared model and pipeline logic for the TrustDesk template service.
//!
//! The backend and any editing front end both depend on this crate:
//!
//! - `model`: wire and storage types (templates, fields, mappings, validation).
//! - `matching`: suggestion and similarity heuristics shared by validation and population.
//! - `mapper`: the interactive field mapper (document model + editing session).
//! - `populate`: substitution of client/task data into template HTML.
//! - `jobs` / `requests`: job status and HTTP request payloads.

pub mod helpers;
pub mod jobs;
pub mod mapper;
pub mod matching;
pub mod model;
pub mod populate;
pub mod requests;
