//! Ad-hoc scans: queued fleet scans and direct one-host scans.
//!
//! Both modes flatten the requested built-ins and stored-check ids into one
//! ordered plan. Queued mode hands every (machine, check) pair to the
//! dispatcher and lets the caller poll for completion; direct mode probes an
//! arbitrary host synchronously and persists nothing.

use std::collections::HashSet;

use anyhow::Result;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use futures::try_join;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{AuditEvent, log_audit_event};
use crate::executor::{ProbedCheck, probe_check_spec, probe_ping};
use crate::handlers::machines::{builtin_system_spec, builtin_user_spec};
use crate::handlers::{FwState, bad_request, internal_error};
use crate::models::{
    CheckRequest, CheckSpec, ExpectedObject, FileCheck, JobKind, RegistryCheck, ServiceCheck,
    SystemCheck, UserCheck,
};
use crate::probe::RemoteProbe;
use crate::store::Store;

/// Queued scans address machines by inventory id; 200 machines at up to a
/// dozen checks each is already a few thousand queued tasks.
const MAX_SCAN_MACHINES: usize = 200;
/// Direct mode has no queue to absorb the work, so each id list is capped.
const MAX_DIRECT_IDS: usize = 500;

const POLL_NOTE: &str = "Poll /api/data/latest-results with { machineIds, objects, since: startedAt } until all expected objects have results.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuiltIns {
    pub ping: bool,
    pub user_info: bool,
    pub system_info: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunScanRequest {
    pub machine_ids: Vec<Uuid>,
    pub built_ins: BuiltIns,
    pub registry_check_ids: Vec<Uuid>,
    pub file_check_ids: Vec<Uuid>,
    pub service_check_ids: Vec<Uuid>,
    pub user_check_ids: Vec<Uuid>,
    pub system_check_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunDirectRequest {
    pub target_host: String,
    pub built_ins: BuiltIns,
    pub registry_check_ids: Vec<Uuid>,
    pub file_check_ids: Vec<Uuid>,
    pub service_check_ids: Vec<Uuid>,
    pub user_check_ids: Vec<Uuid>,
    pub system_check_ids: Vec<Uuid>,
}

/// One entry of a scan plan. Built-ins carry no stored row; the rest carry
/// the fetched check so queued and direct mode agree on names and specs.
enum PlannedCheck {
    Ping,
    BuiltInUser,
    BuiltInSystem,
    Registry(RegistryCheck),
    File(FileCheck),
    Service(ServiceCheck),
    User(UserCheck),
    System(SystemCheck),
}

impl PlannedCheck {
    fn kind(&self) -> JobKind {
        match self {
            PlannedCheck::Ping => JobKind::Ping,
            PlannedCheck::BuiltInUser | PlannedCheck::User(_) => JobKind::UserInfo,
            PlannedCheck::BuiltInSystem | PlannedCheck::System(_) => JobKind::SystemInfo,
            PlannedCheck::Registry(_) => JobKind::RegistryCheck,
            PlannedCheck::File(_) => JobKind::FileCheck,
            PlannedCheck::Service(_) => JobKind::ServiceCheck,
        }
    }

    fn check_name(&self) -> String {
        match self {
            PlannedCheck::Ping => "Ping Test".to_string(),
            PlannedCheck::BuiltInUser => "User Information".to_string(),
            PlannedCheck::BuiltInSystem => "System Information".to_string(),
            PlannedCheck::Registry(check) => check.spec().display_name(),
            PlannedCheck::File(check) => check.spec().display_name(),
            PlannedCheck::Service(check) => check.spec().display_name(),
            PlannedCheck::User(check) => check.spec().display_name(),
            PlannedCheck::System(check) => check.spec().display_name(),
        }
    }

    /// Request shape for the queued path. Stored checks go by id so the
    /// executor re-reads them at run time; built-ins ship their literal spec.
    fn queued_request(&self) -> CheckRequest {
        match self {
            PlannedCheck::Ping => CheckRequest::AllActive,
            PlannedCheck::BuiltInUser => CheckRequest::Literal(builtin_user_spec()),
            PlannedCheck::BuiltInSystem => CheckRequest::Literal(builtin_system_spec()),
            PlannedCheck::Registry(check) => CheckRequest::ById(check.id),
            PlannedCheck::File(check) => CheckRequest::ById(check.id),
            PlannedCheck::Service(check) => CheckRequest::ById(check.id),
            PlannedCheck::User(check) => CheckRequest::ById(check.id),
            PlannedCheck::System(check) => CheckRequest::ById(check.id),
        }
    }

    fn spec(&self) -> Option<CheckSpec> {
        match self {
            PlannedCheck::Ping => None,
            PlannedCheck::BuiltInUser => Some(builtin_user_spec()),
            PlannedCheck::BuiltInSystem => Some(builtin_system_spec()),
            PlannedCheck::Registry(check) => Some(check.spec()),
            PlannedCheck::File(check) => Some(check.spec()),
            PlannedCheck::Service(check) => Some(check.spec()),
            PlannedCheck::User(check) => Some(check.spec()),
            PlannedCheck::System(check) => Some(check.spec()),
        }
    }
}

struct Selection {
    registry: Vec<RegistryCheck>,
    file: Vec<FileCheck>,
    service: Vec<ServiceCheck>,
    user: Vec<UserCheck>,
    system: Vec<SystemCheck>,
}

struct SelectedIds {
    registry: Vec<Uuid>,
    file: Vec<Uuid>,
    service: Vec<Uuid>,
    user: Vec<Uuid>,
    system: Vec<Uuid>,
}

fn uniq(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Fetches selected checks by id. Deliberately does not filter on
/// `is_active`: an explicitly selected check runs even when disabled for
/// scheduled sweeps.
async fn load_selection(store: &dyn Store, ids: &SelectedIds) -> Result<Selection> {
    let (registry, file, service, user, system) = try_join!(
        store.get_registry_checks_by_ids(&ids.registry),
        store.get_file_checks_by_ids(&ids.file),
        store.get_service_checks_by_ids(&ids.service),
        store.get_user_checks_by_ids(&ids.user),
        store.get_system_checks_by_ids(&ids.system),
    )?;
    Ok(Selection {
        registry,
        file,
        service,
        user,
        system,
    })
}

fn push_unique(
    plan: &mut Vec<PlannedCheck>,
    seen: &mut HashSet<(JobKind, String)>,
    check: PlannedCheck,
) {
    if seen.insert((check.kind(), check.check_name())) {
        plan.push(check);
    }
}

/// Fixed scan order: built-ins first, then stored checks grouped by kind.
/// Duplicate `(checkType, checkName)` pairs collapse to the first entry so
/// the expected-object list the client polls with has no ambiguous keys.
fn build_plan(built_ins: &BuiltIns, selection: Selection) -> Vec<PlannedCheck> {
    let mut plan = Vec::new();
    let mut seen = HashSet::new();
    if built_ins.ping {
        push_unique(&mut plan, &mut seen, PlannedCheck::Ping);
    }
    if built_ins.user_info {
        push_unique(&mut plan, &mut seen, PlannedCheck::BuiltInUser);
    }
    if built_ins.system_info {
        push_unique(&mut plan, &mut seen, PlannedCheck::BuiltInSystem);
    }
    for check in selection.registry {
        push_unique(&mut plan, &mut seen, PlannedCheck::Registry(check));
    }
    for check in selection.file {
        push_unique(&mut plan, &mut seen, PlannedCheck::File(check));
    }
    for check in selection.service {
        push_unique(&mut plan, &mut seen, PlannedCheck::Service(check));
    }
    for check in selection.user {
        push_unique(&mut plan, &mut seen, PlannedCheck::User(check));
    }
    for check in selection.system {
        push_unique(&mut plan, &mut seen, PlannedCheck::System(check));
    }
    plan
}

pub async fn run_scan(State(state): State<FwState>, Json(body): Json<RunScanRequest>) -> Response {
    let machine_ids = uniq(&body.machine_ids);
    if machine_ids.is_empty() {
        return bad_request("machineIds is required");
    }
    if machine_ids.len() > MAX_SCAN_MACHINES {
        return bad_request("machineIds is too large");
    }
    match run_scan_inner(&state, &body, machine_ids).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn run_scan_inner(
    state: &FwState,
    body: &RunScanRequest,
    machine_ids: Vec<Uuid>,
) -> Result<Response> {
    let machines = state.store().get_machines_by_ids(&machine_ids).await?;
    let found: HashSet<Uuid> = machines.iter().map(|m| m.id).collect();
    let missing: Vec<Uuid> = machine_ids
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect();
    if !missing.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Some machines were not found",
                "missingMachineIds": missing,
            })),
        )
            .into_response());
    }

    let selected = SelectedIds {
        registry: uniq(&body.registry_check_ids),
        file: uniq(&body.file_check_ids),
        service: uniq(&body.service_check_ids),
        user: uniq(&body.user_check_ids),
        system: uniq(&body.system_check_ids),
    };
    let selection = load_selection(state.store(), &selected).await?;
    let plan = build_plan(&body.built_ins, selection);

    let started_at = Utc::now();
    let started_at_iso = started_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut expected = Vec::with_capacity(machine_ids.len() * plan.len());
    for machine_id in &machine_ids {
        for check in &plan {
            state
                .dispatcher()
                .trigger_check(*machine_id, check.kind(), check.queued_request())
                .await?;
            expected.push(ExpectedObject::new(
                machine_id.to_string(),
                check.kind(),
                check.check_name(),
            ));
        }
    }

    log_audit_event(
        state.store(),
        AuditEvent::new(
            "ADHOC_SCAN_QUEUED",
            format!("Queued ad-hoc scan ({} checks)", expected.len()),
        )
        .entity("AdHocScan", started_at_iso.clone())
        .metadata(json!({
            "machineIds": machine_ids,
            "builtIns": {
                "ping": body.built_ins.ping,
                "userInfo": body.built_ins.user_info,
                "systemInfo": body.built_ins.system_info,
            },
            "selected": {
                "registryCheckIds": selected.registry,
                "fileCheckIds": selected.file,
                "serviceCheckIds": selected.service,
                "userCheckIds": selected.user,
                "systemCheckIds": selected.system,
            },
            "expectedCount": expected.len(),
            "startedAt": started_at_iso,
        })),
    )
    .await;

    Ok(Json(json!({
        "startedAt": started_at_iso,
        "machineIds": machine_ids,
        "expected": expected,
        "expectedCount": expected.len(),
        "note": POLL_NOTE,
    }))
    .into_response())
}

fn sanitize_target_host(raw: &str) -> Result<String, Response> {
    let host = raw.trim();
    if host.is_empty() {
        return Err(bad_request("targetHost is required"));
    }
    if host.len() > 255 || host.chars().any(char::is_control) {
        return Err(bad_request("targetHost is invalid"));
    }
    Ok(host.to_string())
}

/// Runs checks synchronously against a host that need not exist in the
/// inventory. Sub-checks run strictly sequentially so one target never sees
/// more than one remote session from a scan. Nothing is written: no machine
/// row, no result rows, no audit trail.
pub async fn run_direct_scan(
    State(state): State<FwState>,
    Json(body): Json<RunDirectRequest>,
) -> Response {
    let target_host = match sanitize_target_host(&body.target_host) {
        Ok(host) => host,
        Err(response) => return response,
    };
    let selected = SelectedIds {
        registry: uniq(&body.registry_check_ids),
        file: uniq(&body.file_check_ids),
        service: uniq(&body.service_check_ids),
        user: uniq(&body.user_check_ids),
        system: uniq(&body.system_check_ids),
    };
    for (ids, field) in [
        (&selected.registry, "registryCheckIds"),
        (&selected.file, "fileCheckIds"),
        (&selected.service, "serviceCheckIds"),
        (&selected.user, "userCheckIds"),
        (&selected.system, "systemCheckIds"),
    ] {
        if ids.len() > MAX_DIRECT_IDS {
            return bad_request(&format!("{field} is too large"));
        }
    }
    match run_direct_inner(&state, &body.built_ins, &selected, &target_host).await {
        Ok(response) => response,
        Err(error) => internal_error(error),
    }
}

async fn run_direct_inner(
    state: &FwState,
    built_ins: &BuiltIns,
    selected: &SelectedIds,
    target_host: &str,
) -> Result<Response> {
    let selection = load_selection(state.store(), selected).await?;
    let plan = build_plan(built_ins, selection);

    let started_at = Utc::now();
    let target_id = format!("manual:{}", Uuid::new_v4());
    let expected: Vec<ExpectedObject> = plan
        .iter()
        .map(|check| ExpectedObject::new(target_id.clone(), check.kind(), check.check_name()))
        .collect();

    let mut results = Vec::with_capacity(plan.len());
    for check in &plan {
        let probed = match probe_planned(state.probe(), target_host, check).await {
            Ok(probed) => probed,
            Err(error) => {
                warn!(
                    "Direct scan {} against {target_host} failed: {error:#}",
                    check.kind()
                );
                ProbedCheck::fault(&error)
            }
        };
        results.push(json!({
            "id": Uuid::new_v4(),
            "machineId": target_id,
            "checkType": check.kind().to_string(),
            "checkName": check.check_name(),
            "status": probed.status.to_string(),
            "resultData": probed.data,
            "message": probed.message,
            "duration": probed.duration_ms,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }));
    }

    Ok(Json(json!({
        "startedAt": started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "targetHost": target_host,
        "targetId": target_id,
        "expected": expected,
        "expectedCount": expected.len(),
        "results": results,
    }))
    .into_response())
}

async fn probe_planned(
    probe: &dyn RemoteProbe,
    host: &str,
    check: &PlannedCheck,
) -> Result<ProbedCheck> {
    match check.spec() {
        None => probe_ping(probe, host).await,
        Some(spec) => probe_check_spec(probe, host, &spec)
            .await
            .map(|(probed, _pc_model)| probed),
    }
}
