//! HTTP surface and queue wiring.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use serde_json::json;

use crate::audit::{AuditEvent, AuditLevel, log_audit_event};
use crate::handlers::{FwState, adhoc_scan, data, machines, schedules, status};
use crate::queue::{QueueEvent, TaskQueue};
use crate::store::Store;

pub fn build_router(state: FwState) -> Router {
    Router::new()
        .route("/api/health", get(status::health))
        .route(
            "/api/machines/:id/check",
            post(machines::trigger_machine_check),
        )
        .route(
            "/api/schedules/jobs",
            get(schedules::list_jobs).post(schedules::create_job),
        )
        .route(
            "/api/schedules/jobs/:id",
            get(schedules::get_job)
                .put(schedules::update_job)
                .delete(schedules::delete_job),
        )
        .route(
            "/api/schedules/jobs/:id/run-now",
            post(schedules::run_job_now),
        )
        .route("/api/adhoc-scan/run", post(adhoc_scan::run_scan))
        .route(
            "/api/adhoc-scan/run-direct",
            post(adhoc_scan::run_direct_scan),
        )
        .route("/api/data/latest-results", post(data::latest_results))
        .with_state(state)
}

/// Audits terminal failures of scheduled-job tasks. The executor already
/// writes a CHECK_EXECUTION_ERROR row per failed attempt; the JOB_FAILED row
/// ties the exhausted task back to the job that queued it.
pub fn register_queue_listeners(store: Arc<dyn Store>, queue: &dyn TaskQueue) {
    queue.on_event(Box::new(move |event| {
        let QueueEvent::Failed { task, error, .. } = event else {
            return;
        };
        let Some(job_id) = task.scheduled_job_id else {
            return;
        };
        let store = store.clone();
        let job_kind = task.job_kind;
        let machine_id = task.machine_id;
        let error = error.clone();
        tokio::spawn(async move {
            log_audit_event(
                store.as_ref(),
                AuditEvent::new(
                    "JOB_FAILED",
                    format!("Job failed: {job_kind} for machine {machine_id}"),
                )
                .level(AuditLevel::Error)
                .machine(machine_id)
                .entity("ScheduledJob", job_id.to_string())
                .metadata(json!({ "jobType": job_kind.to_string(), "error": error })),
            )
            .await;
        });
    }));
}
