//! Shared state of long-running background jobs.
//!
//! Batch document generation (`services::documents::batch`) runs outside the
//! request/response cycle; clients poll `GET /api/documents/jobs/{job_id}`.
//!
//! - `JobsState`: clonable, injected as `web::Data` in `main.rs`; the map is the
//!   single source of truth for job statuses.
//! - `JobUpdate`: a status change sent by a worker.
//! - `start_job_updater`: the only writer after registration; drains the
//!   channel and applies updates in arrival order.

use common::jobs::JobStatus;
use log::debug;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

/// Capacity of the channel between workers and the updater.
pub const JOB_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct JobsState {
    /// Job id -> latest status. Read by the status endpoint, written by the updater.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Workers report through this sender instead of locking `jobs`.
    pub tx: mpsc::Sender<JobUpdate>,
}

impl JobsState {
    /// Creates the state and the receiver to hand to `start_job_updater`.
    pub fn new() -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(JOB_CHANNEL_CAPACITY);
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    /// Registers a job as `Pending` before any worker can report on it.
    pub async fn register(&self, job_id: &str) {
        self.jobs
            .write()
            .await
            .insert(job_id.to_string(), JobStatus::Pending);
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

/// Applies `JobUpdate`s to `state` until every sender is dropped.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        debug!("Job {} -> {:?}", update.job_id, update.status);
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id, update.status);
    }
}
