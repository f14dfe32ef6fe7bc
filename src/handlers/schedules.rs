//! Scheduled job CRUD plus the manual run-now path.
//!
//! Create and update validate the cron expression and job type up front so a
//! bad definition can never reach the cron registry.

use std::str::FromStr;

use anyhow::Result;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, log_audit_event};
use crate::dispatcher::cron_to_schedule;
use crate::handlers::{FwState, bad_request, internal_error, not_found};
use crate::models::{JobKind, Machine, ScheduledJob, ScheduledJobInput};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobBody {
    pub name: Option<String>,
    pub job_type: Option<String>,
    pub cron_expression: Option<String>,
    pub target_all: Option<bool>,
    pub is_active: Option<bool>,
    pub target_machine_ids: Option<Vec<Uuid>>,
}

fn provided(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn validate_cron(expression: &str) -> Result<(), Response> {
    if expression.split(' ').count() < 5 || cron_to_schedule(expression).is_err() {
        return Err(bad_request("Invalid cron expression"));
    }
    Ok(())
}

/// Serialized job plus its explicit target machines. Jobs targeting the
/// whole fleet carry an empty list; resolution happens at fire time.
fn job_with_targets(job: &ScheduledJob, machines: &[Machine]) -> Result<Value> {
    let mut value = serde_json::to_value(job)?;
    let targets: Vec<Value> = machines
        .iter()
        .map(|m| json!({ "id": m.id, "hostname": m.hostname, "ipAddress": m.ip_address }))
        .collect();
    value["targetMachines"] = Value::Array(targets);
    Ok(value)
}

pub async fn list_jobs(State(state): State<FwState>) -> Response {
    match list_jobs_inner(&state).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(error) => internal_error(error),
    }
}

async fn list_jobs_inner(state: &FwState) -> Result<Vec<Value>> {
    let jobs = state.store().list_scheduled_jobs().await?;
    let mut out = Vec::with_capacity(jobs.len());
    for job in jobs {
        let machines = state.store().get_job_target_machines(job.id).await?;
        out.push(job_with_targets(&job, &machines)?);
    }
    Ok(out)
}

pub async fn get_job(State(state): State<FwState>, Path(id): Path<Uuid>) -> Response {
    match get_job_inner(&state, id).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn get_job_inner(state: &FwState, id: Uuid) -> Result<Response> {
    let Some(job) = state.store().get_scheduled_job(id).await? else {
        return Ok(not_found("Job not found"));
    };
    let machines = state.store().get_job_target_machines(id).await?;
    Ok(Json(job_with_targets(&job, &machines)?).into_response())
}

pub async fn create_job(State(state): State<FwState>, Json(body): Json<JobBody>) -> Response {
    let (Some(name), Some(job_type), Some(cron_expression)) = (
        provided(&body.name).map(str::to_string),
        provided(&body.job_type).map(str::to_string),
        provided(&body.cron_expression).map(str::to_string),
    ) else {
        return bad_request("Name, job type, and cron expression required");
    };
    if let Err(response) = validate_cron(&cron_expression) {
        return response;
    }
    if let Err(error) = JobKind::from_str(&job_type) {
        return bad_request(&error.to_string());
    }
    match create_job_inner(&state, &body, name, job_type, cron_expression).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn create_job_inner(
    state: &FwState,
    body: &JobBody,
    name: String,
    job_type: String,
    cron_expression: String,
) -> Result<Response> {
    // Target rows are only written when the caller explicitly opted out of
    // the whole fleet; targetAll jobs resolve their machines at fire time.
    let target_machine_ids = if !body.target_all.unwrap_or(false) {
        body.target_machine_ids.clone().unwrap_or_default()
    } else {
        Vec::new()
    };
    let input = ScheduledJobInput {
        name,
        job_type,
        cron_expression,
        target_all: body.target_all.unwrap_or(true),
        is_active: true,
        target_machine_ids,
    };
    let job = state.store().create_scheduled_job(&input).await?;
    state.dispatcher().schedule_job(job.id).await?;

    info!("Created scheduled job: {}", job.name);
    log_audit_event(
        state.store(),
        AuditEvent::new(
            "SCHEDULED_JOB_CREATED",
            format!("Scheduled job created: {}", job.name),
        )
        .entity("ScheduledJob", job.id.to_string())
        .metadata(json!({
            "id": job.id,
            "name": job.name,
            "jobType": job.job_type,
            "cronExpression": job.cron_expression,
            "targetAll": job.target_all,
            "isActive": job.is_active,
        })),
    )
    .await;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

pub async fn update_job(
    State(state): State<FwState>,
    Path(id): Path<Uuid>,
    Json(body): Json<JobBody>,
) -> Response {
    if let Some(cron) = provided(&body.cron_expression) {
        if let Err(response) = validate_cron(cron) {
            return response;
        }
    }
    if let Some(job_type) = provided(&body.job_type) {
        if let Err(error) = JobKind::from_str(job_type) {
            return bad_request(&error.to_string());
        }
    }
    match update_job_inner(&state, id, &body).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn update_job_inner(state: &FwState, id: Uuid, body: &JobBody) -> Result<Response> {
    let Some(existing) = state.store().get_scheduled_job(id).await? else {
        return Ok(not_found("Job not found"));
    };

    // Absent list keeps the current associations; a provided list replaces
    // them, and collapses to nothing when the job targets the whole fleet.
    let target_machine_ids = match &body.target_machine_ids {
        Some(ids) if !body.target_all.unwrap_or(false) && !ids.is_empty() => ids.clone(),
        Some(_) => Vec::new(),
        None => state.store().get_job_target_ids(id).await?,
    };

    let input = ScheduledJobInput {
        name: provided(&body.name)
            .map(str::to_string)
            .unwrap_or(existing.name),
        job_type: provided(&body.job_type)
            .map(str::to_string)
            .unwrap_or(existing.job_type),
        cron_expression: provided(&body.cron_expression)
            .map(str::to_string)
            .unwrap_or(existing.cron_expression),
        target_all: body.target_all.unwrap_or(existing.target_all),
        is_active: body.is_active.unwrap_or(existing.is_active),
        target_machine_ids,
    };
    let Some(job) = state.store().update_scheduled_job(id, &input).await? else {
        return Ok(not_found("Job not found"));
    };

    if provided(&body.cron_expression).is_some() || body.is_active.is_some() {
        state.dispatcher().unschedule_job(id);
        if job.is_active {
            state.dispatcher().schedule_job(id).await?;
        }
    }

    log_audit_event(
        state.store(),
        AuditEvent::new(
            "SCHEDULED_JOB_UPDATED",
            format!("Scheduled job updated: {}", job.name),
        )
        .entity("ScheduledJob", job.id.to_string())
        .metadata(json!({
            "id": job.id,
            "name": &body.name,
            "jobType": &body.job_type,
            "cronExpression": &body.cron_expression,
            "targetAll": body.target_all,
            "isActive": body.is_active,
        })),
    )
    .await;
    Ok(Json(job).into_response())
}

pub async fn delete_job(State(state): State<FwState>, Path(id): Path<Uuid>) -> Response {
    match delete_job_inner(&state, id).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn delete_job_inner(state: &FwState, id: Uuid) -> Result<Response> {
    let Some(existing) = state.store().get_scheduled_job(id).await? else {
        return Ok(not_found("Job not found"));
    };
    state.dispatcher().unschedule_job(id);
    state.store().delete_scheduled_job(id).await?;

    info!("Deleted scheduled job: {id}");
    log_audit_event(
        state.store(),
        AuditEvent::new(
            "SCHEDULED_JOB_DELETED",
            format!("Scheduled job deleted: {}", existing.name),
        )
        .entity("ScheduledJob", id.to_string())
        .metadata(json!({
            "id": id,
            "name": existing.name,
            "jobType": existing.job_type,
            "cronExpression": existing.cron_expression,
        })),
    )
    .await;
    Ok(Json(json!({ "success": true })).into_response())
}

pub async fn run_job_now(State(state): State<FwState>, Path(id): Path<Uuid>) -> Response {
    match run_job_now_inner(&state, id).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn run_job_now_inner(state: &FwState, id: Uuid) -> Result<Response> {
    let Some((job, machines)) = state.dispatcher().run_job_now(id).await? else {
        return Ok(not_found("Job not found"));
    };

    log_audit_event(
        state.store(),
        AuditEvent::new(
            "SCHEDULED_JOB_RUN_NOW",
            format!(
                "Scheduled job run-now: {} ({} machines)",
                job.name,
                machines.len()
            ),
        )
        .entity("ScheduledJob", job.id.to_string())
        .metadata(json!({
            "id": job.id,
            "name": job.name,
            "jobType": job.job_type,
            "machines": machines
                .iter()
                .map(|m| json!({ "id": m.id, "hostname": m.hostname }))
                .collect::<Vec<_>>(),
        })),
    )
    .await;
    Ok(Json(json!({
        "success": true,
        "message": format!("Queued {} checks", machines.len()),
    }))
    .into_response())
}
