//! Persistence boundary.
//!
//! Handlers, the executor, and the dispatcher talk to a [`Store`] instead of
//! holding the pool directly, so unit tests can swap in the in-memory
//! implementation and assert on what was written.

mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::models::{
    CheckResult, FileCheck, Machine, MachinePatch, NewCheckResult, RegistryCheck, ScheduledJob,
    ScheduledJobInput, ServiceCheck, SystemCheck, UserCheck,
};

#[async_trait]
pub trait Store: Send + Sync {
    // Machines
    async fn get_machine(&self, id: Uuid) -> Result<Option<Machine>>;
    async fn get_machines_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Machine>>;
    async fn list_machines(&self) -> Result<Vec<Machine>>;
    async fn update_machine(&self, id: Uuid, patch: &MachinePatch) -> Result<()>;
    async fn count_machines(&self) -> Result<i64>;

    // Check definitions
    async fn list_active_registry_checks(&self) -> Result<Vec<RegistryCheck>>;
    async fn get_registry_check(&self, id: Uuid) -> Result<Option<RegistryCheck>>;
    async fn get_registry_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<RegistryCheck>>;
    async fn list_active_file_checks(&self) -> Result<Vec<FileCheck>>;
    async fn get_file_check(&self, id: Uuid) -> Result<Option<FileCheck>>;
    async fn get_file_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileCheck>>;
    async fn list_active_service_checks(&self) -> Result<Vec<ServiceCheck>>;
    async fn get_service_check(&self, id: Uuid) -> Result<Option<ServiceCheck>>;
    async fn get_service_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceCheck>>;
    async fn list_active_user_checks(&self) -> Result<Vec<UserCheck>>;
    async fn get_user_check(&self, id: Uuid) -> Result<Option<UserCheck>>;
    async fn get_user_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserCheck>>;
    async fn list_active_system_checks(&self) -> Result<Vec<SystemCheck>>;
    async fn get_system_check(&self, id: Uuid) -> Result<Option<SystemCheck>>;
    async fn get_system_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SystemCheck>>;

    // Check results
    async fn insert_check_result(&self, row: &NewCheckResult) -> Result<CheckResult>;
    async fn get_latest_results(
        &self,
        machine_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CheckResult>>;
    async fn count_check_results(&self) -> Result<i64>;

    // Scheduled jobs
    async fn list_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>>;
    async fn list_active_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>>;
    async fn get_scheduled_job(&self, id: Uuid) -> Result<Option<ScheduledJob>>;
    async fn create_scheduled_job(&self, input: &ScheduledJobInput) -> Result<ScheduledJob>;
    async fn update_scheduled_job(
        &self,
        id: Uuid,
        input: &ScheduledJobInput,
    ) -> Result<Option<ScheduledJob>>;
    async fn delete_scheduled_job(&self, id: Uuid) -> Result<bool>;
    async fn get_job_target_machines(&self, job_id: Uuid) -> Result<Vec<Machine>>;
    async fn get_job_target_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>>;
    async fn touch_job_last_run(&self, id: Uuid) -> Result<()>;

    // Audit
    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()>;
}
