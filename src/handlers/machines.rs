//! Manual single-check trigger.

use std::str::FromStr;

use anyhow::Result;
use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditEvent, log_audit_event};
use crate::handlers::{FwState, bad_request, internal_error, not_found};
use crate::models::{CheckRequest, CheckSpec, JobKind, SystemCheckKind, UserCheckKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCheckBody {
    pub check_type: Option<String>,
    pub check_config: Option<CheckConfig>,
}

/// Kind-specific override carried with a manual trigger. A literal payload
/// beats an id reference beats the all-active sweep.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckConfig {
    pub name: Option<String>,
    pub builtin: Option<bool>,
    pub registry_check_id: Option<Uuid>,
    pub registry_path: Option<String>,
    pub value_name: Option<String>,
    pub expected_value: Option<String>,
    pub file_check_id: Option<Uuid>,
    pub file_path: Option<String>,
    pub check_exists: Option<bool>,
    pub service_check_id: Option<Uuid>,
    pub service_name: Option<String>,
    pub executable_path: Option<String>,
    pub expected_status: Option<String>,
    pub user_check_id: Option<Uuid>,
    pub system_check_id: Option<Uuid>,
}

pub(crate) fn builtin_user_spec() -> CheckSpec {
    CheckSpec::User {
        name: None,
        kind: UserCheckKind::CurrentAndLast,
        custom_script: None,
    }
}

pub(crate) fn builtin_system_spec() -> CheckSpec {
    CheckSpec::System {
        name: None,
        kind: SystemCheckKind::SystemInfo,
        custom_script: None,
    }
}

/// Maps the optional request config onto a [`CheckRequest`]. For user and
/// system kinds any config without an id reference selects the built-in
/// default probe, matching how ad-hoc scans address them.
fn check_request(kind: JobKind, config: Option<CheckConfig>) -> CheckRequest {
    let Some(config) = config else {
        return CheckRequest::AllActive;
    };
    match kind {
        JobKind::RegistryCheck => {
            if let Some(registry_path) = config.registry_path {
                CheckRequest::Literal(CheckSpec::Registry {
                    name: config.name,
                    registry_path,
                    value_name: config.value_name,
                    expected_value: config.expected_value,
                })
            } else if let Some(id) = config.registry_check_id {
                CheckRequest::ById(id)
            } else {
                CheckRequest::AllActive
            }
        }
        JobKind::FileCheck => {
            if let Some(file_path) = config.file_path {
                CheckRequest::Literal(CheckSpec::File {
                    name: config.name,
                    file_path,
                    check_exists: config.check_exists,
                })
            } else if let Some(id) = config.file_check_id {
                CheckRequest::ById(id)
            } else {
                CheckRequest::AllActive
            }
        }
        JobKind::ServiceCheck => {
            if config.service_name.is_some() || config.executable_path.is_some() {
                CheckRequest::Literal(CheckSpec::Service {
                    name: config.name,
                    service_name: config.service_name,
                    executable_path: config.executable_path,
                    expected_status: config.expected_status,
                })
            } else if let Some(id) = config.service_check_id {
                CheckRequest::ById(id)
            } else {
                CheckRequest::AllActive
            }
        }
        JobKind::UserInfo => match config.user_check_id {
            Some(id) => CheckRequest::ById(id),
            None => CheckRequest::Literal(builtin_user_spec()),
        },
        JobKind::SystemInfo => match config.system_check_id {
            Some(id) => CheckRequest::ById(id),
            None => CheckRequest::Literal(builtin_system_spec()),
        },
        JobKind::Ping | JobKind::FullCheck | JobKind::BaselineCheck => CheckRequest::AllActive,
    }
}

pub async fn trigger_machine_check(
    State(state): State<FwState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TriggerCheckBody>,
) -> Response {
    let Some(check_type) = body.check_type.filter(|s| !s.is_empty()) else {
        return bad_request("Check type required");
    };
    let kind = match JobKind::from_str(&check_type) {
        Ok(kind) => kind,
        Err(error) => return bad_request(&error.to_string()),
    };
    match trigger_inner(&state, id, kind, body.check_config).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn trigger_inner(
    state: &FwState,
    id: Uuid,
    kind: JobKind,
    config: Option<CheckConfig>,
) -> Result<Response> {
    let Some(machine) = state.store().get_machine(id).await? else {
        return Ok(not_found("Machine not found"));
    };

    state
        .dispatcher()
        .trigger_check(machine.id, kind, check_request(kind, config))
        .await?;

    log_audit_event(
        state.store(),
        AuditEvent::new("CHECK_QUEUED", format!("Queued {kind} for {}", machine.hostname))
            .machine(machine.id)
            .entity("Machine", machine.id.to_string())
            .metadata(json!({ "checkType": kind.to_string() })),
    )
    .await;

    Ok(Json(json!({
        "success": true,
        "message": format!("{kind} check queued for {}", machine.hostname),
    }))
    .into_response())
}
