//! # Batch Generation Service
//!
//! `POST /api/documents/batch` generates one document per task for a single
//! template, in the background.
//!
//! ## Workflow:
//!
//! 1.  **HTTP Request**: the handler checks that the template exists and the
//!     task list is not empty, registers a `Pending` job and returns its
//!     `job_id` at once. Clients poll `GET /api/documents/jobs/{job_id}`.
//!
//! 2.  **Background Processing**: a Tokio task runs `batch_blocking` through
//!     `spawn_blocking`; inside it, the tasks are generated in parallel on the
//!     rayon pool with a cloned [`DocumentGenerator`].
//!
//! 3.  **Progress Reporting**: every finished task sends a `BatchUpdate::Task`
//!     to a per-job listener, which turns it into a percentage and forwards a
//!     `JobUpdate` to the central job controller.
//!
//! 4.  **Outcome**: the job completes when every task produced a document and
//!     fails with the collected errors otherwise. Documents generated before a
//!     failure stay stored.

use super::generate::DocumentGenerator;
use crate::error::AppError;
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::services::templates::record;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use common::jobs::JobStatus;
use common::requests::BatchGenerateRequest;
use log::{error, info};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress sent from the blocking worker to the job's listener.
#[derive(Debug)]
pub enum BatchUpdate {
    /// Overrides the status of the whole job.
    Job(JobStatus),
    /// One more task finished, successfully or not.
    Task { completed: usize, total: usize },
}

pub(crate) async fn process(
    state: web::Data<AppState>,
    jobs: web::Data<JobsState>,
    payload: web::Json<BatchGenerateRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    if request.task_ids.is_empty() {
        return Err(AppError::BadRequest("task_ids must not be empty".to_string()));
    }
    record::load(state.db.as_ref(), &request.template_id)?;

    let generator = DocumentGenerator::from_state(&state);
    let job_id = schedule_batch_job(&jobs, generator, request).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })))
}

/// Registers the job and spawns its worker; returns the job id.
pub(crate) async fn schedule_batch_job(
    jobs: &JobsState,
    generator: DocumentGenerator,
    request: BatchGenerateRequest,
) -> String {
    let job_id = Uuid::new_v4().to_string();
    jobs.register(&job_id).await;

    let tx = jobs.tx.clone();
    let job_id_for_task = job_id.clone();
    tokio::spawn(async move {
        let (batch_tx, mut batch_rx) = mpsc::channel::<BatchUpdate>(100);

        let listener_tx = tx.clone();
        let listener_job_id = job_id_for_task.clone();
        let listener = tokio::spawn(async move {
            while let Some(update) = batch_rx.recv().await {
                let status = match update {
                    BatchUpdate::Job(status) => status,
                    BatchUpdate::Task { completed, total } => {
                        JobStatus::InProgress(progress_percent(completed, total))
                    }
                };
                let _ = listener_tx
                    .send(JobUpdate {
                        job_id: listener_job_id.clone(),
                        status,
                    })
                    .await;
            }
        });

        let handle = tokio::task::spawn_blocking(move || {
            batch_blocking(
                &generator,
                batch_tx,
                &request.template_id,
                &request.task_ids,
            )
        });

        let status = match handle.await {
            Ok(Ok(count)) => JobStatus::Completed(format!("Generated {} document(s)", count)),
            Ok(Err(e)) => JobStatus::Failed(e),
            Err(e) => JobStatus::Failed(format!("Task join error: {}", e)),
        };
        // Progress must not overwrite the final status.
        let _ = listener.await;
        match &status {
            JobStatus::Failed(e) => error!("Batch job {} failed: {}", job_id_for_task, e),
            _ => info!("Batch job {} completed", job_id_for_task),
        }
        let _ = tx
            .send(JobUpdate {
                job_id: job_id_for_task,
                status,
            })
            .await;
    });

    job_id
}

/// Generates every task on the rayon pool. Returns the number of documents.
fn batch_blocking(
    generator: &DocumentGenerator,
    tx: mpsc::Sender<BatchUpdate>,
    template_id: &str,
    task_ids: &[String],
) -> Result<usize, String> {
    let _ = tx.blocking_send(BatchUpdate::Job(JobStatus::InProgress(0)));
    let total = task_ids.len();
    let completed = AtomicUsize::new(0);

    let failures: Vec<String> = task_ids
        .par_iter()
        .filter_map(|task_id| {
            let result = generator.generate(task_id, Some(template_id));
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = tx.blocking_send(BatchUpdate::Task {
                completed: done,
                total,
            });
            result.err().map(|e| format!("task {}: {}", task_id, e))
        })
        .collect();

    if failures.is_empty() {
        Ok(total)
    } else {
        Err(format!(
            "{} of {} task(s) failed: {}",
            failures.len(),
            total,
            failures.join("; ")
        ))
    }
}

fn progress_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f32 / total as f32 * 100.0) as u32
}
