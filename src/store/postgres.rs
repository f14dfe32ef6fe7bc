use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::models::{
    CheckResult, FileCheck, Machine, MachinePatch, NewCheckResult, RegistryCheck, ScheduledJob,
    ScheduledJobInput, ServiceCheck, SystemCheck, UserCheck,
};
use crate::queries;
use crate::store::Store;

/// Postgres-backed [`Store`]. Thin delegation onto the query modules.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_machine(&self, id: Uuid) -> Result<Option<Machine>> {
        queries::machines::get_machine_by_id(&self.pool, id).await
    }

    async fn get_machines_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Machine>> {
        queries::machines::get_machines_by_ids(&self.pool, ids).await
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        queries::machines::get_all_machines(&self.pool).await
    }

    async fn update_machine(&self, id: Uuid, patch: &MachinePatch) -> Result<()> {
        queries::machines::update_machine(&self.pool, id, patch).await
    }

    async fn count_machines(&self) -> Result<i64> {
        queries::machines::count_machines(&self.pool).await
    }

    async fn list_active_registry_checks(&self) -> Result<Vec<RegistryCheck>> {
        queries::checks::get_active_registry_checks(&self.pool).await
    }

    async fn get_registry_check(&self, id: Uuid) -> Result<Option<RegistryCheck>> {
        queries::checks::get_registry_check_by_id(&self.pool, id).await
    }

    async fn get_registry_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<RegistryCheck>> {
        queries::checks::get_registry_checks_by_ids(&self.pool, ids).await
    }

    async fn list_active_file_checks(&self) -> Result<Vec<FileCheck>> {
        queries::checks::get_active_file_checks(&self.pool).await
    }

    async fn get_file_check(&self, id: Uuid) -> Result<Option<FileCheck>> {
        queries::checks::get_file_check_by_id(&self.pool, id).await
    }

    async fn get_file_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileCheck>> {
        queries::checks::get_file_checks_by_ids(&self.pool, ids).await
    }

    async fn list_active_service_checks(&self) -> Result<Vec<ServiceCheck>> {
        queries::checks::get_active_service_checks(&self.pool).await
    }

    async fn get_service_check(&self, id: Uuid) -> Result<Option<ServiceCheck>> {
        queries::checks::get_service_check_by_id(&self.pool, id).await
    }

    async fn get_service_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceCheck>> {
        queries::checks::get_service_checks_by_ids(&self.pool, ids).await
    }

    async fn list_active_user_checks(&self) -> Result<Vec<UserCheck>> {
        queries::checks::get_active_user_checks(&self.pool).await
    }

    async fn get_user_check(&self, id: Uuid) -> Result<Option<UserCheck>> {
        queries::checks::get_user_check_by_id(&self.pool, id).await
    }

    async fn get_user_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserCheck>> {
        queries::checks::get_user_checks_by_ids(&self.pool, ids).await
    }

    async fn list_active_system_checks(&self) -> Result<Vec<SystemCheck>> {
        queries::checks::get_active_system_checks(&self.pool).await
    }

    async fn get_system_check(&self, id: Uuid) -> Result<Option<SystemCheck>> {
        queries::checks::get_system_check_by_id(&self.pool, id).await
    }

    async fn get_system_checks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SystemCheck>> {
        queries::checks::get_system_checks_by_ids(&self.pool, ids).await
    }

    async fn insert_check_result(&self, row: &NewCheckResult) -> Result<CheckResult> {
        queries::check_results::insert_check_result(&self.pool, row).await
    }

    async fn get_latest_results(
        &self,
        machine_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CheckResult>> {
        queries::check_results::get_latest_results(&self.pool, machine_ids, since).await
    }

    async fn count_check_results(&self) -> Result<i64> {
        queries::check_results::count_check_results(&self.pool).await
    }

    async fn list_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        queries::scheduled_jobs::get_all_scheduled_jobs(&self.pool).await
    }

    async fn list_active_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        queries::scheduled_jobs::get_active_scheduled_jobs(&self.pool).await
    }

    async fn get_scheduled_job(&self, id: Uuid) -> Result<Option<ScheduledJob>> {
        queries::scheduled_jobs::get_scheduled_job_by_id(&self.pool, id).await
    }

    async fn create_scheduled_job(&self, input: &ScheduledJobInput) -> Result<ScheduledJob> {
        queries::scheduled_jobs::insert_scheduled_job(&self.pool, input).await
    }

    async fn update_scheduled_job(
        &self,
        id: Uuid,
        input: &ScheduledJobInput,
    ) -> Result<Option<ScheduledJob>> {
        queries::scheduled_jobs::update_scheduled_job(&self.pool, id, input).await
    }

    async fn delete_scheduled_job(&self, id: Uuid) -> Result<bool> {
        queries::scheduled_jobs::delete_scheduled_job(&self.pool, id).await
    }

    async fn get_job_target_machines(&self, job_id: Uuid) -> Result<Vec<Machine>> {
        queries::scheduled_jobs::get_job_target_machines(&self.pool, job_id).await
    }

    async fn get_job_target_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>> {
        queries::scheduled_jobs::get_job_target_ids(&self.pool, job_id).await
    }

    async fn touch_job_last_run(&self, id: Uuid) -> Result<()> {
        queries::scheduled_jobs::touch_job_last_run(&self.pool, id).await
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<()> {
        queries::audit_events::insert_audit_event(&self.pool, event).await
    }
}
