//! In-memory [`Store`] for unit tests. Same visible semantics as the
//! Postgres implementation: active listings sort by name, latest-result
//! lookup keeps the newest row per (machine, type, name) key.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::models::{
    CheckResult, FileCheck, Machine, MachinePatch, NewCheckResult, RegistryCheck, ScheduledJob,
    ScheduledJobInput, ServiceCheck, SystemCheck, UserCheck,
};
use crate::store::Store;

#[derive(Default)]
pub struct MemStore {
    machines: Mutex<Vec<Machine>>,
    registry_checks: Mutex<Vec<RegistryCheck>>,
    file_checks: Mutex<Vec<FileCheck>>,
    service_checks: Mutex<Vec<ServiceCheck>>,
    user_checks: Mutex<Vec<UserCheck>>,
    system_checks: Mutex<Vec<SystemCheck>>,
    results: Mutex<Vec<CheckResult>>,
    jobs: Mutex<Vec<ScheduledJob>>,
    job_targets: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    audits: Mutex<Vec<AuditEvent>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_machine(&self, hostname: &str) -> Machine {
        let machine = Machine {
            id: Uuid::new_v4(),
            hostname: hostname.to_string(),
            ip_address: "10.0.0.1".to_string(),
            status: "UNKNOWN".to_string(),
            pc_model: None,
            last_seen: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.machines.lock().unwrap().push(machine.clone());
        machine
    }

    pub fn add_registry_check(
        &self,
        name: &str,
        registry_path: &str,
        value_name: Option<&str>,
        expected_value: Option<&str>,
    ) -> RegistryCheck {
        let check = RegistryCheck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            registry_path: registry_path.to_string(),
            value_name: value_name.map(str::to_string),
            expected_value: expected_value.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };
        self.registry_checks.lock().unwrap().push(check.clone());
        check
    }

    pub fn add_file_check(&self, name: &str, file_path: &str, check_exists: bool) -> FileCheck {
        let check = FileCheck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            check_exists,
            is_active: true,
            created_at: Utc::now(),
        };
        self.file_checks.lock().unwrap().push(check.clone());
        check
    }

    pub fn add_service_check(
        &self,
        name: &str,
        service_name: Option<&str>,
        executable_path: Option<&str>,
        expected_status: Option<&str>,
    ) -> ServiceCheck {
        let check = ServiceCheck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            service_name: service_name.map(str::to_string),
            executable_path: executable_path.map(str::to_string),
            expected_status: expected_status.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };
        self.service_checks.lock().unwrap().push(check.clone());
        check
    }

    pub fn add_user_check(&self, name: &str, check_type: &str) -> UserCheck {
        let check = UserCheck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            check_type: check_type.to_string(),
            custom_script: None,
            is_active: true,
            created_at: Utc::now(),
        };
        self.user_checks.lock().unwrap().push(check.clone());
        check
    }

    pub fn add_system_check(&self, name: &str, check_type: &str) -> SystemCheck {
        let check = SystemCheck {
            id: Uuid::new_v4(),
            name: name.to_string(),
            check_type: check_type.to_string(),
            custom_script: None,
            is_active: true,
            created_at: Utc::now(),
        };
        self.system_checks.lock().unwrap().push(check.clone());
        check
    }

    pub fn deactivate_registry_check(&self, id: Uuid) {
        let mut checks = self.registry_checks.lock().unwrap();
        if let Some(check) = checks.iter_mut().find(|c| c.id == id) {
            check.is_active = false;
        }
    }

    pub fn machine(&self, id: Uuid) -> Option<Machine> {
        self.machines.lock().unwrap().iter().find(|m| m.id == id).cloned()
    }

    pub fn results(&self) -> Vec<CheckResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn audits(&self) -> Vec<AuditEvent> {
        self.audits.lock().unwrap().clone()
    }

    pub fn audit_types(&self) -> Vec<String> {
        self.audits
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_machine(&self, id: Uuid) -> Result<Option<Machine>> {
        Ok(self.machine(id))
    }

    async fn get_machines_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Machine>> {
        Ok(self
            .machines
            .lock()
            .unwrap()
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        let mut machines = self.machines.lock().unwrap().clone();
        machines.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(machines)
    }

    async fn update_machine(&self, id: Uuid, patch: &MachinePatch) -> Result<()> {
        let mut machines = self.machines.lock().unwrap();
        if let Some(machine) = machines.iter_mut().find(|m| m.id == id) {
            if let Some(status) = patch.status {
                machine.status = status.to_string();
            }
            if let Some(last_seen) = patch.last_seen {
                machine.last_seen = Some(last_seen);
            }
            if let Some(pc_model) = &patch.pc_model {
                machine.pc_model = Some(pc_model.clone());
            }
            machine.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_machines(&self) -> Result<i64> {
        Ok(self.machines.lock().unwrap().len() as i64)
    }

    async fn list_active_registry_checks(&self) -> Result<Vec<RegistryCheck>> {
        let mut checks: Vec<_> = self
            .registry_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn get_registry_check(&self, id: Uuid) -> Result<Option<RegistryCheck>> {
        Ok(self
            .registry_checks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_registry_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<RegistryCheck>> {
        let mut checks: Vec<_> = self
            .registry_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn list_active_file_checks(&self) -> Result<Vec<FileCheck>> {
        let mut checks: Vec<_> = self
            .file_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn get_file_check(&self, id: Uuid) -> Result<Option<FileCheck>> {
        Ok(self
            .file_checks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_file_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileCheck>> {
        let mut checks: Vec<_> = self
            .file_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn list_active_service_checks(&self) -> Result<Vec<ServiceCheck>> {
        let mut checks: Vec<_> = self
            .service_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn get_service_check(&self, id: Uuid) -> Result<Option<ServiceCheck>> {
        Ok(self
            .service_checks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_service_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceCheck>> {
        let mut checks: Vec<_> = self
            .service_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn list_active_user_checks(&self) -> Result<Vec<UserCheck>> {
        let mut checks: Vec<_> = self
            .user_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn get_user_check(&self, id: Uuid) -> Result<Option<UserCheck>> {
        Ok(self
            .user_checks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_user_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserCheck>> {
        let mut checks: Vec<_> = self
            .user_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn list_active_system_checks(&self) -> Result<Vec<SystemCheck>> {
        let mut checks: Vec<_> = self
            .system_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn get_system_check(&self, id: Uuid) -> Result<Option<SystemCheck>> {
        Ok(self
            .system_checks
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_system_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SystemCheck>> {
        let mut checks: Vec<_> = self
            .system_checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    async fn insert_check_result(&self, row: &NewCheckResult) -> Result<CheckResult> {
        let result = CheckResult {
            id: Uuid::new_v4(),
            machine_id: row.machine_id,
            check_type: row.check_type.to_string(),
            check_name: row.check_name.clone(),
            status: row.status.to_string(),
            result_data: row.result_data.clone(),
            message: row.message.clone(),
            duration_ms: row.duration_ms,
            created_at: Utc::now(),
        };
        self.results.lock().unwrap().push(result.clone());
        Ok(result)
    }

    async fn get_latest_results(
        &self,
        machine_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CheckResult>> {
        let results = self.results.lock().unwrap();
        let mut latest: HashMap<(Uuid, String, String), CheckResult> = HashMap::new();
        for row in results.iter() {
            if !machine_ids.contains(&row.machine_id) {
                continue;
            }
            if let Some(since) = since {
                if row.created_at < since {
                    continue;
                }
            }
            let key = (row.machine_id, row.check_type.clone(), row.check_name.clone());
            match latest.get(&key) {
                // Later insertion wins ties, matching DISTINCT ON ordering.
                Some(existing) if existing.created_at > row.created_at => {}
                _ => {
                    latest.insert(key, row.clone());
                }
            }
        }
        let mut rows: Vec<_> = latest.into_values().collect();
        rows.sort_by(|a, b| {
            (a.machine_id, &a.check_type, &a.check_name)
                .cmp(&(b.machine_id, &b.check_type, &b.check_name))
        });
        Ok(rows)
    }

    async fn count_check_results(&self) -> Result<i64> {
        Ok(self.results.lock().unwrap().len() as i64)
    }

    async fn list_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let mut jobs = self.jobs.lock().unwrap().clone();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn list_active_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let mut jobs: Vec<_> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.is_active)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn get_scheduled_job(&self, id: Uuid) -> Result<Option<ScheduledJob>> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
    }

    async fn create_scheduled_job(&self, input: &ScheduledJobInput) -> Result<ScheduledJob> {
        let job = ScheduledJob {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            job_type: input.job_type.clone(),
            cron_expression: input.cron_expression.clone(),
            target_all: input.target_all,
            is_active: input.is_active,
            last_run_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.jobs.lock().unwrap().push(job.clone());
        self.job_targets
            .lock()
            .unwrap()
            .insert(job.id, input.target_machine_ids.clone());
        Ok(job)
    }

    async fn update_scheduled_job(
        &self,
        id: Uuid,
        input: &ScheduledJobInput,
    ) -> Result<Option<ScheduledJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        job.name = input.name.clone();
        job.job_type = input.job_type.clone();
        job.cron_expression = input.cron_expression.clone();
        job.target_all = input.target_all;
        job.is_active = input.is_active;
        job.updated_at = Utc::now();
        let updated = job.clone();
        self.job_targets
            .lock()
            .unwrap()
            .insert(id, input.target_machine_ids.clone());
        Ok(Some(updated))
    }

    async fn delete_scheduled_job(&self, id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        self.job_targets.lock().unwrap().remove(&id);
        Ok(jobs.len() < before)
    }

    async fn get_job_target_machines(&self, job_id: Uuid) -> Result<Vec<Machine>> {
        let ids = self
            .job_targets
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default();
        let mut machines: Vec<_> = self
            .machines
            .lock()
            .unwrap()
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect();
        machines.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(machines)
    }

    async fn get_job_target_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .job_targets
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn touch_job_last_run(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.last_run_at = Some(Utc::now());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        self.audits.lock().unwrap().push(event.clone());
        Ok(())
    }
}
