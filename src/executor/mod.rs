//! Check task execution.
//!
//! One [`CheckTask`] covers one machine and one job kind. The executor
//! resolves the task's request against stored definitions, drives the
//! remote probe, evaluates raw output against declared expectations, and
//! persists one `check_results` row per sub-check. The machine row is
//! patched exactly once per task, from the folded [`BatchOutcome`].
//!
//! Failure semantics: a probe transport fault aborts a single-check task
//! (synthetic `FAILED` row, error re-thrown so the queue retries), but in
//! bulk and composite modes it is confined to the failing sub-check so the
//! rest of the batch still completes.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditLevel, log_audit_event};
use crate::evaluate::{
    Evaluation, evaluate_file_check, evaluate_plain, evaluate_registry_check,
    evaluate_service_check,
};
use crate::models::{
    BatchOutcome, CheckRequest, CheckSpec, CheckStatus, CheckTask, JobKind, Machine,
    NewCheckResult, SystemCheckKind, UserCheckKind,
};
use crate::probe::RemoteProbe;
use crate::registry_path::{normalize_registry_path, normalize_value_name};
use crate::store::Store;

/// A probed and evaluated sub-check, ready to persist or to hand straight
/// back to an API caller.
#[derive(Debug, Clone)]
pub struct ProbedCheck {
    pub status: CheckStatus,
    pub data: Value,
    pub message: Option<String>,
    pub duration_ms: i64,
}

impl ProbedCheck {
    fn from_evaluation(evaluation: Evaluation, duration_ms: i64) -> Self {
        Self {
            status: evaluation.status,
            data: evaluation.data,
            message: evaluation.message,
            duration_ms,
        }
    }

    /// Stand-in row for a sub-check whose probe call itself failed.
    pub(crate) fn fault(error: &anyhow::Error) -> Self {
        Self {
            status: CheckStatus::Failed,
            data: json!({}),
            message: Some(error.to_string()),
            duration_ms: 0,
        }
    }
}

pub async fn probe_ping(probe: &dyn RemoteProbe, host: &str) -> Result<ProbedCheck> {
    let ps = probe.ping(host).await?;
    let duration_ms = ps.duration_ms;
    Ok(ProbedCheck::from_evaluation(evaluate_plain(&ps), duration_ms))
}

pub async fn probe_registry_check(
    probe: &dyn RemoteProbe,
    host: &str,
    registry_path: &str,
    value_name: Option<&str>,
    expected_value: Option<&str>,
) -> Result<ProbedCheck> {
    let path = normalize_registry_path(registry_path);
    let value_name = normalize_value_name(value_name);
    let ps = probe.registry_value(host, &path, value_name.as_deref()).await?;
    let duration_ms = ps.duration_ms;
    Ok(ProbedCheck::from_evaluation(
        evaluate_registry_check(value_name.as_deref(), expected_value, &ps),
        duration_ms,
    ))
}

pub async fn probe_file_check(
    probe: &dyn RemoteProbe,
    host: &str,
    file_path: &str,
    check_exists: Option<bool>,
) -> Result<ProbedCheck> {
    let ps = probe.file_info(host, file_path).await?;
    let duration_ms = ps.duration_ms;
    Ok(ProbedCheck::from_evaluation(
        evaluate_file_check(check_exists, &ps),
        duration_ms,
    ))
}

pub async fn probe_service_check(
    probe: &dyn RemoteProbe,
    host: &str,
    service_name: Option<&str>,
    executable_path: Option<&str>,
    expected_status: Option<&str>,
) -> Result<ProbedCheck> {
    let ps = probe.service_info(host, service_name, executable_path).await?;
    let duration_ms = ps.duration_ms;
    Ok(ProbedCheck::from_evaluation(
        evaluate_service_check(expected_status, &ps),
        duration_ms,
    ))
}

/// User session probe. The composite kinds wrap the raw probe output in a
/// `{currentUser, lastUser}` object rather than parsing it.
pub async fn probe_user_check(
    probe: &dyn RemoteProbe,
    host: &str,
    kind: UserCheckKind,
    custom_script: Option<&str>,
) -> Result<ProbedCheck> {
    if kind == UserCheckKind::Custom {
        if let Some(script) = custom_script {
            let ps = probe.run_script(host, script).await?;
            let duration_ms = ps.duration_ms;
            return Ok(ProbedCheck::from_evaluation(evaluate_plain(&ps), duration_ms));
        }
    }
    match kind {
        UserCheckKind::CurrentOnly => {
            let current = probe.current_user(host).await?;
            Ok(ProbedCheck {
                status: success_status(current.success),
                data: json!({ "currentUser": current.output }),
                message: current.error,
                duration_ms: current.duration_ms,
            })
        }
        UserCheckKind::LastOnly => {
            let last = probe.last_logged_on_user(host).await?;
            Ok(ProbedCheck {
                status: success_status(last.success),
                data: json!({ "lastUser": last.output }),
                message: last.error,
                duration_ms: last.duration_ms,
            })
        }
        // CURRENT_AND_LAST, and CUSTOM without a script.
        _ => {
            let current = probe.current_user(host).await?;
            let last = probe.last_logged_on_user(host).await?;
            Ok(ProbedCheck {
                status: success_status(current.success && last.success),
                data: json!({ "currentUser": current.output, "lastUser": last.output }),
                message: current.error.or(last.error),
                duration_ms: current.duration_ms + last.duration_ms,
            })
        }
    }
}

/// System inventory probe. Returns the evaluated check plus any PC model
/// parsed out of the payload.
pub async fn probe_system_check(
    probe: &dyn RemoteProbe,
    host: &str,
    kind: SystemCheckKind,
    custom_script: Option<&str>,
) -> Result<(ProbedCheck, Option<String>)> {
    if kind == SystemCheckKind::Custom {
        if let Some(script) = custom_script {
            let ps = probe.run_script(host, script).await?;
            let duration_ms = ps.duration_ms;
            return Ok((
                ProbedCheck::from_evaluation(evaluate_plain(&ps), duration_ms),
                None,
            ));
        }
    }
    let ps = probe.system_info(host).await?;
    let duration_ms = ps.duration_ms;
    let check = ProbedCheck::from_evaluation(evaluate_plain(&ps), duration_ms);
    let pc_model = pc_model_from_system_info(&check.data);
    Ok((check, pc_model))
}

/// Probes and evaluates one [`CheckSpec`]. The Task Executor and the
/// direct-mode ad-hoc path both resolve specs through here so composite
/// user/system handling can never diverge between them.
pub async fn probe_check_spec(
    probe: &dyn RemoteProbe,
    host: &str,
    spec: &CheckSpec,
) -> Result<(ProbedCheck, Option<String>)> {
    match spec {
        CheckSpec::Registry {
            registry_path,
            value_name,
            expected_value,
            ..
        } => {
            let check = probe_registry_check(
                probe,
                host,
                registry_path,
                value_name.as_deref(),
                expected_value.as_deref(),
            )
            .await?;
            Ok((check, None))
        }
        CheckSpec::File {
            file_path,
            check_exists,
            ..
        } => {
            let check = probe_file_check(probe, host, file_path, *check_exists).await?;
            Ok((check, None))
        }
        CheckSpec::Service {
            service_name,
            executable_path,
            expected_status,
            ..
        } => {
            let check = probe_service_check(
                probe,
                host,
                service_name.as_deref(),
                executable_path.as_deref(),
                expected_status.as_deref(),
            )
            .await?;
            Ok((check, None))
        }
        CheckSpec::User {
            kind,
            custom_script,
            ..
        } => {
            let check = probe_user_check(probe, host, *kind, custom_script.as_deref()).await?;
            Ok((check, None))
        }
        CheckSpec::System {
            kind,
            custom_script,
            ..
        } => probe_system_check(probe, host, *kind, custom_script.as_deref()).await,
    }
}

/// Pulls a trimmed `"Manufacturer Model"` string out of a system-info
/// payload; either casing of the keys is accepted.
pub fn pc_model_from_system_info(data: &Value) -> Option<String> {
    let obj = data.as_object()?;
    let field = |upper: &str, lower: &str| -> String {
        match obj.get(upper).or_else(|| obj.get(lower)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        }
    };
    let combined = format!("{} {}", field("Manufacturer", "manufacturer"), field("Model", "model"));
    let combined = combined.trim().to_string();
    if combined.is_empty() { None } else { Some(combined) }
}

fn success_status(success: bool) -> CheckStatus {
    if success {
        CheckStatus::Success
    } else {
        CheckStatus::Failed
    }
}

pub struct CheckExecutor {
    store: Arc<dyn Store>,
    probe: Arc<dyn RemoteProbe>,
}

impl CheckExecutor {
    pub fn new(store: Arc<dyn Store>, probe: Arc<dyn RemoteProbe>) -> Self {
        Self { store, probe }
    }

    /// Runs one task to completion: per-sub-check result rows, one machine
    /// patch, audit trail. Errors out (after writing a synthetic `FAILED`
    /// row) so the queue can retry.
    pub async fn run_task(&self, task: &CheckTask) -> Result<BatchOutcome> {
        let machine = self
            .store
            .get_machine(task.machine_id)
            .await?
            .with_context(|| format!("Machine {} not found", task.machine_id))?;

        let mut started_meta = json!({ "jobType": task.job_kind.to_string() });
        if let Some(job_id) = task.scheduled_job_id {
            started_meta["scheduledJobId"] = json!(job_id);
        }
        log_audit_event(
            self.store.as_ref(),
            AuditEvent::new(
                "CHECK_EXECUTION_STARTED",
                format!("Executing {} on {}", task.job_kind, machine.hostname),
            )
            .machine(machine.id)
            .metadata(started_meta),
        )
        .await;

        match self.dispatch(&machine, task).await {
            Ok(outcome) => {
                self.store
                    .update_machine(machine.id, &outcome.clone().into_patch(Utc::now()))
                    .await?;

                let (event_type, level, verb) = if outcome.any_failed {
                    ("CHECK_EXECUTION_FAILED", AuditLevel::Error, "Failed")
                } else {
                    ("CHECK_EXECUTION_COMPLETED", AuditLevel::Info, "Completed")
                };
                info!(
                    "Completed {} for machine {} ({} checks)",
                    task.job_kind, machine.hostname, outcome.checks_run
                );
                log_audit_event(
                    self.store.as_ref(),
                    AuditEvent::new(
                        event_type,
                        format!("{verb} {} for {}", task.job_kind, machine.hostname),
                    )
                    .level(level)
                    .machine(machine.id)
                    .metadata(json!({
                        "jobType": task.job_kind.to_string(),
                        "checksRun": outcome.checks_run,
                    })),
                )
                .await;
                Ok(outcome)
            }
            Err(error) => {
                error!(
                    "❌ Failed to process {} for machine {}: {error:#}",
                    task.job_kind, machine.hostname
                );
                log_audit_event(
                    self.store.as_ref(),
                    AuditEvent::new(
                        "CHECK_EXECUTION_ERROR",
                        format!("Error executing {} for {}", task.job_kind, machine.hostname),
                    )
                    .level(AuditLevel::Error)
                    .machine(machine.id)
                    .metadata(json!({
                        "jobType": task.job_kind.to_string(),
                        "error": error.to_string(),
                    })),
                )
                .await;

                let failure = NewCheckResult {
                    machine_id: machine.id,
                    check_type: task.job_kind,
                    check_name: task.job_kind.to_string(),
                    status: CheckStatus::Failed,
                    result_data: json!({}),
                    message: Some(error.to_string()),
                    duration_ms: 0,
                };
                if let Err(insert_error) = self.store.insert_check_result(&failure).await {
                    warn!(
                        "Failed to record error result for {}: {insert_error:#}",
                        machine.hostname
                    );
                }
                Err(error)
            }
        }
    }

    async fn dispatch(&self, machine: &Machine, task: &CheckTask) -> Result<BatchOutcome> {
        match task.job_kind {
            JobKind::Ping => self.run_ping(machine).await,
            JobKind::RegistryCheck => self.run_registry(machine, &task.request).await,
            JobKind::FileCheck => self.run_file(machine, &task.request).await,
            JobKind::ServiceCheck => self.run_service(machine, &task.request).await,
            JobKind::UserInfo => self.run_user(machine, &task.request).await,
            JobKind::SystemInfo => self.run_system(machine, &task.request).await,
            JobKind::FullCheck => self.run_suite(machine, true).await,
            JobKind::BaselineCheck => self.run_suite(machine, false).await,
        }
    }

    async fn run_ping(&self, machine: &Machine) -> Result<BatchOutcome> {
        let ping = probe_ping(self.probe.as_ref(), &machine.hostname).await?;
        let mut outcome = BatchOutcome::default();
        outcome.record(ping.status);
        self.persist(machine, JobKind::Ping, "Ping Test".to_string(), ping)
            .await?;
        Ok(outcome)
    }

    async fn run_registry(&self, machine: &Machine, request: &CheckRequest) -> Result<BatchOutcome> {
        let specs = match request {
            CheckRequest::AllActive => {
                let checks = self.store.list_active_registry_checks().await?;
                if checks.is_empty() {
                    bail!("No active registry checks configured");
                }
                checks.iter().map(|c| c.spec()).collect()
            }
            CheckRequest::ById(id) => {
                let check = self
                    .store
                    .get_registry_check(*id)
                    .await?
                    .with_context(|| format!("Registry check not found: {id}"))?;
                vec![check.spec()]
            }
            CheckRequest::Literal(spec) => vec![spec.clone()],
        };
        self.run_specs(machine, JobKind::RegistryCheck, &specs, request)
            .await
    }

    async fn run_file(&self, machine: &Machine, request: &CheckRequest) -> Result<BatchOutcome> {
        let specs = match request {
            CheckRequest::AllActive => {
                let checks = self.store.list_active_file_checks().await?;
                if checks.is_empty() {
                    bail!("No active file checks configured");
                }
                checks.iter().map(|c| c.spec()).collect()
            }
            CheckRequest::ById(id) => {
                let check = self
                    .store
                    .get_file_check(*id)
                    .await?
                    .with_context(|| format!("File check not found: {id}"))?;
                vec![check.spec()]
            }
            CheckRequest::Literal(spec) => vec![spec.clone()],
        };
        self.run_specs(machine, JobKind::FileCheck, &specs, request)
            .await
    }

    async fn run_service(&self, machine: &Machine, request: &CheckRequest) -> Result<BatchOutcome> {
        let specs = match request {
            CheckRequest::AllActive => {
                let checks = self.store.list_active_service_checks().await?;
                if checks.is_empty() {
                    bail!("No active service checks configured");
                }
                checks.iter().map(|c| c.spec()).collect()
            }
            CheckRequest::ById(id) => {
                let check = self
                    .store
                    .get_service_check(*id)
                    .await?
                    .with_context(|| format!("Service check not found: {id}"))?;
                vec![check.spec()]
            }
            CheckRequest::Literal(spec) => vec![spec.clone()],
        };
        self.run_specs(machine, JobKind::ServiceCheck, &specs, request)
            .await
    }

    async fn run_user(&self, machine: &Machine, request: &CheckRequest) -> Result<BatchOutcome> {
        let specs = match request {
            CheckRequest::AllActive => {
                let checks = self.store.list_active_user_checks().await?;
                if checks.is_empty() {
                    bail!("No active user checks configured");
                }
                checks.iter().map(|c| c.spec()).collect()
            }
            CheckRequest::ById(id) => {
                let check = self
                    .store
                    .get_user_check(*id)
                    .await?
                    .with_context(|| format!("User check not found: {id}"))?;
                vec![check.spec()]
            }
            CheckRequest::Literal(spec) => vec![spec.clone()],
        };
        self.run_specs(machine, JobKind::UserInfo, &specs, request)
            .await
    }

    async fn run_system(&self, machine: &Machine, request: &CheckRequest) -> Result<BatchOutcome> {
        let specs = match request {
            CheckRequest::AllActive => {
                let checks = self.store.list_active_system_checks().await?;
                if checks.is_empty() {
                    bail!("No active system checks configured");
                }
                checks.iter().map(|c| c.spec()).collect()
            }
            CheckRequest::ById(id) => {
                let check = self
                    .store
                    .get_system_check(*id)
                    .await?
                    .with_context(|| format!("System check not found: {id}"))?;
                vec![check.spec()]
            }
            CheckRequest::Literal(spec) => vec![spec.clone()],
        };
        self.run_specs(machine, JobKind::SystemInfo, &specs, request)
            .await
    }

    /// Full suite: ping + system + user + all registry + all file, each row
    /// stored under its native check type. The baseline variant drops the
    /// ping and user session probes.
    async fn run_suite(&self, machine: &Machine, full: bool) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        if full {
            let ping = match probe_ping(self.probe.as_ref(), &machine.hostname).await {
                Ok(check) => check,
                Err(error) => {
                    warn!("Ping probe fault for {}: {error:#}", machine.hostname);
                    ProbedCheck::fault(&error)
                }
            };
            outcome.record(ping.status);
            self.persist(machine, JobKind::Ping, "Ping Test".to_string(), ping)
                .await?;
        }

        let system = CheckSpec::System {
            name: None,
            kind: SystemCheckKind::SystemInfo,
            custom_script: None,
        };
        self.run_one_spec(machine, JobKind::SystemInfo, &system, &mut outcome, true)
            .await?;

        if full {
            let user = CheckSpec::User {
                name: None,
                kind: UserCheckKind::CurrentAndLast,
                custom_script: None,
            };
            self.run_one_spec(machine, JobKind::UserInfo, &user, &mut outcome, true)
                .await?;
        }

        for check in self.store.list_active_registry_checks().await? {
            self.run_one_spec(
                machine,
                JobKind::RegistryCheck,
                &check.spec(),
                &mut outcome,
                true,
            )
            .await?;
        }
        for check in self.store.list_active_file_checks().await? {
            self.run_one_spec(machine, JobKind::FileCheck, &check.spec(), &mut outcome, true)
                .await?;
        }

        Ok(outcome)
    }

    async fn run_specs(
        &self,
        machine: &Machine,
        kind: JobKind,
        specs: &[CheckSpec],
        request: &CheckRequest,
    ) -> Result<BatchOutcome> {
        // Bulk sweeps isolate probe faults per sub-check; single-check
        // tasks let them propagate into the queue's retry path.
        let isolate_faults = matches!(request, CheckRequest::AllActive);
        let mut outcome = BatchOutcome::default();
        for spec in specs {
            self.run_one_spec(machine, kind, spec, &mut outcome, isolate_faults)
                .await?;
        }
        Ok(outcome)
    }

    async fn run_one_spec(
        &self,
        machine: &Machine,
        kind: JobKind,
        spec: &CheckSpec,
        outcome: &mut BatchOutcome,
        isolate_faults: bool,
    ) -> Result<()> {
        let (check, pc_model) =
            match probe_check_spec(self.probe.as_ref(), &machine.hostname, spec).await {
                Ok(result) => result,
                Err(error) if isolate_faults => {
                    warn!(
                        "Probe fault during {} for {}: {error:#}",
                        kind, machine.hostname
                    );
                    (ProbedCheck::fault(&error), None)
                }
                Err(error) => return Err(error),
            };
        outcome.observe_pc_model(pc_model);
        outcome.record(check.status);
        self.persist(machine, kind, spec.display_name(), check).await
    }

    async fn persist(
        &self,
        machine: &Machine,
        kind: JobKind,
        check_name: String,
        check: ProbedCheck,
    ) -> Result<()> {
        self.store
            .insert_check_result(&NewCheckResult {
                machine_id: machine.id,
                check_type: kind,
                check_name,
                status: check.status,
                result_data: check.data,
                message: check.message,
                duration_ms: check.duration_ms,
            })
            .await?;
        Ok(())
    }
}
