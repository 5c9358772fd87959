use serde::{Deserialize, Serialize};

/// Status of a background job, as reported by `GET /api/documents/jobs/{job_id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    /// Percentage of tasks processed so far.
    InProgress(u32),
    Completed(String),
    Failed(String),
}
