use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};

/// `GET /api/documents/jobs/{job_id}`
///
/// Returns the latest `JobStatus` of a batch job, or `404` for an unknown id.
pub(crate) async fn process(job_id: web::Path<String>, state: web::Data<JobsState>) -> impl Responder {
    match state.status(&job_id).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().json(serde_json::json!({ "error": "job not found" })),
    }
}

#[cfg(test)]
mod tests {
    use crate::job_controller::state::JobsState;
    use crate::state::testing::app_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use common::jobs::JobStatus;

    #[actix_web::test]
    async fn reports_registered_jobs_only() {
        let (state, _dir) = app_state();
        let (jobs, _rx) = JobsState::new();
        jobs.register("job-1").await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(jobs))
                .service(super::super::configure_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/documents/jobs/job-1").to_request();
        let status: JobStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status, JobStatus::Pending);

        let req = test::TestRequest::get().uri("/api/documents/jobs/job-2").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
