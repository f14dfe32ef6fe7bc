use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::check_results::CheckStatus;
use crate::models::checks::{SystemCheckKind, UserCheckKind};
use crate::models::machines::{MachinePatch, MachineStatus};

/// Every job a task can carry. Composite kinds fan out into several probe
/// families inside one task; the rest map to a single check family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Ping,
    RegistryCheck,
    FileCheck,
    ServiceCheck,
    UserInfo,
    SystemInfo,
    FullCheck,
    BaselineCheck,
}

impl JobKind {
    pub fn is_composite(&self) -> bool {
        matches!(self, JobKind::FullCheck | JobKind::BaselineCheck)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Ping => write!(f, "PING"),
            JobKind::RegistryCheck => write!(f, "REGISTRY_CHECK"),
            JobKind::FileCheck => write!(f, "FILE_CHECK"),
            JobKind::ServiceCheck => write!(f, "SERVICE_CHECK"),
            JobKind::UserInfo => write!(f, "USER_INFO"),
            JobKind::SystemInfo => write!(f, "SYSTEM_INFO"),
            JobKind::FullCheck => write!(f, "FULL_CHECK"),
            JobKind::BaselineCheck => write!(f, "BASELINE_CHECK"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PING" => Ok(JobKind::Ping),
            "REGISTRY_CHECK" => Ok(JobKind::RegistryCheck),
            "FILE_CHECK" => Ok(JobKind::FileCheck),
            "SERVICE_CHECK" => Ok(JobKind::ServiceCheck),
            "USER_INFO" => Ok(JobKind::UserInfo),
            "SYSTEM_INFO" => Ok(JobKind::SystemInfo),
            "FULL_CHECK" => Ok(JobKind::FullCheck),
            "BASELINE_CHECK" => Ok(JobKind::BaselineCheck),
            _ => Err(anyhow::anyhow!("Unknown job type: {}", s)),
        }
    }
}

/// A literal check carried inline in a task, bypassing the stored
/// definitions entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckSpec {
    Registry {
        name: Option<String>,
        registry_path: String,
        value_name: Option<String>,
        expected_value: Option<String>,
    },
    File {
        name: Option<String>,
        file_path: String,
        check_exists: Option<bool>,
    },
    Service {
        name: Option<String>,
        service_name: Option<String>,
        executable_path: Option<String>,
        expected_status: Option<String>,
    },
    User {
        name: Option<String>,
        kind: UserCheckKind,
        custom_script: Option<String>,
    },
    System {
        name: Option<String>,
        kind: SystemCheckKind,
        custom_script: Option<String>,
    },
}

impl CheckSpec {
    /// Result-row name for this check, falling back to the kind's stock
    /// label when the definition is unnamed.
    pub fn display_name(&self) -> String {
        let (name, fallback) = match self {
            CheckSpec::Registry { name, .. } => (name, "Registry Check"),
            CheckSpec::File { name, .. } => (name, "File Check"),
            CheckSpec::Service { name, .. } => (name, "Service Check"),
            CheckSpec::User { name, .. } => (name, "User Information"),
            CheckSpec::System { name, .. } => (name, "System Information"),
        };
        name.clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// What a task should run, resolved once at task entry. Literal beats an id
/// reference beats the bulk all-active sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckRequest {
    AllActive,
    ById(Uuid),
    Literal(CheckSpec),
}

/// One unit of queued work: one machine, one job kind, one request.
#[derive(Debug, Clone)]
pub struct CheckTask {
    pub job_kind: JobKind,
    pub machine_id: Uuid,
    pub scheduled_job_id: Option<Uuid>,
    pub request: CheckRequest,
}

impl CheckTask {
    pub fn new(job_kind: JobKind, machine_id: Uuid, request: CheckRequest) -> Self {
        Self {
            job_kind,
            machine_id,
            scheduled_job_id: None,
            request,
        }
    }

    pub fn for_scheduled_job(mut self, scheduled_job_id: Uuid) -> Self {
        self.scheduled_job_id = Some(scheduled_job_id);
        self
    }
}

/// Pure fold over the statuses of one task's sub-checks. Handlers build one
/// of these and the executor turns it into a single machine patch at the
/// end of the task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub checks_run: u32,
    pub any_failed: bool,
    pub any_warning: bool,
    pub pc_model: Option<String>,
}

impl BatchOutcome {
    pub fn single(status: CheckStatus) -> Self {
        let mut outcome = Self::default();
        outcome.record(status);
        outcome
    }

    pub fn record(&mut self, status: CheckStatus) {
        self.checks_run += 1;
        match status {
            CheckStatus::Failed => self.any_failed = true,
            CheckStatus::Warning => self.any_warning = true,
            CheckStatus::Success => {}
        }
    }

    /// Later system-info probes win, matching the last-write behavior of a
    /// sequential batch.
    pub fn observe_pc_model(&mut self, pc_model: Option<String>) {
        if pc_model.is_some() {
            self.pc_model = pc_model;
        }
    }

    pub fn merge(&mut self, other: BatchOutcome) {
        self.checks_run += other.checks_run;
        self.any_failed |= other.any_failed;
        self.any_warning |= other.any_warning;
        if other.pc_model.is_some() {
            self.pc_model = other.pc_model;
        }
    }

    pub fn rollup_status(&self) -> MachineStatus {
        if self.any_failed {
            MachineStatus::Error
        } else if self.any_warning {
            MachineStatus::Warning
        } else {
            MachineStatus::Online
        }
    }

    pub fn into_patch(self, now: DateTime<Utc>) -> MachinePatch {
        MachinePatch {
            status: Some(self.rollup_status()),
            last_seen: Some(now),
            pc_model: self.pc_model,
        }
    }
}
