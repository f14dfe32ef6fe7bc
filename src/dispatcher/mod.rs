//! Cron-driven job dispatch.
//!
//! Active scheduled jobs are registered here as in-process cron entries
//! keyed `scheduled-<job id>`. A periodic poll walks the registrations and
//! enqueues one task per target machine for every entry whose fire time has
//! passed. Targets are resolved at fire time, so machines enrolled after a
//! job was created are picked up without re-registration.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, log_audit_event};
use crate::models::{CheckRequest, CheckTask, JobKind, Machine, ScheduledJob};
use crate::queue::TaskQueue;
use crate::store::Store;

struct CronRegistration {
    job_id: Uuid,
    schedule: Schedule,
    next_fire: Option<DateTime<Utc>>,
}

pub struct JobDispatcher {
    store: Arc<dyn Store>,
    queue: Arc<dyn TaskQueue>,
    registrations: Mutex<HashMap<String, CronRegistration>>,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            queue,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Registers every active job's cron entry. Called once at startup.
    pub async fn register_active_jobs(&self) -> Result<usize> {
        let jobs = self.store.list_active_scheduled_jobs().await?;
        let count = jobs.len();
        for job in jobs {
            self.schedule_job(job.id).await?;
        }
        info!("Scheduled {count} jobs");
        Ok(count)
    }

    /// (Re-)registers one job's cron entry from its current stored state.
    /// A job that is gone or inactive just drops any stale entry.
    pub async fn schedule_job(&self, job_id: Uuid) -> Result<()> {
        let job = match self.store.get_scheduled_job(job_id).await? {
            Some(job) if job.is_active => job,
            _ => {
                warn!("Job {job_id} not found or inactive");
                self.unschedule_job(job_id);
                return Ok(());
            }
        };

        let schedule = cron_to_schedule(&job.cron_expression)?;
        let next_fire = schedule.upcoming(Utc).next();
        info!("📌 Scheduled job {} with cron: {}", job.name, job.cron_expression);
        self.registrations.lock().unwrap().insert(
            registration_key(job_id),
            CronRegistration {
                job_id,
                schedule,
                next_fire,
            },
        );
        Ok(())
    }

    pub fn unschedule_job(&self, job_id: Uuid) {
        if self
            .registrations
            .lock()
            .unwrap()
            .remove(&registration_key(job_id))
            .is_some()
        {
            info!("Unscheduled job {job_id}");
        }
    }

    pub fn registered_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    /// Queues one ad-hoc task for one machine.
    pub async fn trigger_check(
        &self,
        machine_id: Uuid,
        kind: JobKind,
        request: CheckRequest,
    ) -> Result<()> {
        self.queue
            .enqueue(CheckTask::new(kind, machine_id, request))
            .await?;
        info!("Manually triggered {kind} check for machine {machine_id}");
        Ok(())
    }

    /// Fires a job immediately, outside its cron cadence. Returns the job
    /// and its resolved targets so the caller can report them; `None` means
    /// no such job.
    pub async fn run_job_now(&self, job_id: Uuid) -> Result<Option<(ScheduledJob, Vec<Machine>)>> {
        let Some(job) = self.store.get_scheduled_job(job_id).await? else {
            return Ok(None);
        };
        let machines = self.resolve_targets(&job).await?;
        let kind = JobKind::from_str(&job.job_type)?;
        for machine in &machines {
            self.queue
                .enqueue(
                    CheckTask::new(kind, machine.id, CheckRequest::AllActive)
                        .for_scheduled_job(job.id),
                )
                .await?;
        }
        self.store.touch_job_last_run(job.id).await?;
        info!(
            "▶️ Run-now queued {} tasks for job {}",
            machines.len(),
            job.name
        );
        Ok(Some((job, machines)))
    }

    /// Enqueues tasks for every registration due at `now`, advancing each
    /// fired entry to its next occurrence. Returns the number of tasks
    /// enqueued; one broken job never blocks the others.
    pub async fn fire_due_jobs(&self, now: DateTime<Utc>) -> Result<usize> {
        let due: Vec<Uuid> = {
            let mut registrations = self.registrations.lock().unwrap();
            registrations
                .values_mut()
                .filter(|entry| entry.next_fire.is_some_and(|at| at <= now))
                .map(|entry| {
                    entry.next_fire = entry.schedule.after(&now).next();
                    entry.job_id
                })
                .collect()
        };

        let mut enqueued = 0;
        for job_id in due {
            match self.fire_job(job_id).await {
                Ok(tasks) => {
                    enqueued += tasks;
                    debug!("Fired job {job_id} ({tasks} tasks)");
                }
                Err(e) => error!("❌ Failed to fire scheduled job {job_id}: {e:#}"),
            }
        }
        Ok(enqueued)
    }

    async fn fire_job(&self, job_id: Uuid) -> Result<usize> {
        let job = match self.store.get_scheduled_job(job_id).await? {
            Some(job) if job.is_active => job,
            _ => {
                warn!("Job {job_id} not found or inactive");
                self.unschedule_job(job_id);
                return Ok(0);
            }
        };

        let machines = self.resolve_targets(&job).await?;
        if machines.is_empty() {
            debug!("Job {} has no target machines", job.name);
            return Ok(0);
        }

        let kind = JobKind::from_str(&job.job_type)?;
        log_audit_event(
            self.store.as_ref(),
            AuditEvent::new(
                "SCHEDULED_JOB_PROCESSING",
                format!("Scheduled job processing: {} ({})", job.id, job.job_type),
            )
            .entity("ScheduledJob", job.id.to_string())
            .metadata(serde_json::json!({
                "jobType": job.job_type,
                "machines": machines.iter().map(|m| m.id).collect::<Vec<_>>(),
            })),
        )
        .await;

        for machine in &machines {
            self.queue
                .enqueue(
                    CheckTask::new(kind, machine.id, CheckRequest::AllActive)
                        .for_scheduled_job(job.id),
                )
                .await?;
        }
        Ok(machines.len())
    }

    async fn resolve_targets(&self, job: &ScheduledJob) -> Result<Vec<Machine>> {
        if job.target_all {
            self.store.list_machines().await
        } else {
            self.store.get_job_target_machines(job.id).await
        }
    }
}

/// Spawns the poll loop that fires due cron registrations.
pub fn spawn_cron_loop(dispatcher: Arc<JobDispatcher>, poll_interval: Duration) {
    tokio::spawn(async move {
        info!(
            "🔁 Starting scheduled job poll loop (every {}s)...",
            poll_interval.as_secs()
        );
        loop {
            if let Err(e) = dispatcher.fire_due_jobs(Utc::now()).await {
                error!("❌ Error in scheduled job cycle: {e}");
            }
            sleep(poll_interval).await;
        }
    });
}

fn registration_key(job_id: Uuid) -> String {
    format!("scheduled-{job_id}")
}

/// Parses a cron expression, accepting the classic 5-field form by
/// prepending a seconds field.
pub fn cron_to_schedule(expression: &str) -> Result<Schedule> {
    let expression = expression.trim();
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&normalized)
        .with_context(|| format!("invalid cron expression '{expression}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduledJobInput;
    use crate::queue::recording::RecordingQueue;
    use crate::store::memory::MemStore;

    fn job_input(name: &str, target_all: bool, targets: Vec<Uuid>) -> ScheduledJobInput {
        ScheduledJobInput {
            name: name.to_string(),
            job_type: "FULL_CHECK".to_string(),
            cron_expression: "*/5 * * * *".to_string(),
            target_all,
            is_active: true,
            target_machine_ids: targets,
        }
    }

    fn dispatcher(store: &Arc<MemStore>, queue: &Arc<RecordingQueue>) -> JobDispatcher {
        JobDispatcher::new(store.clone(), queue.clone())
    }

    #[test]
    fn test_cron_to_schedule_accepts_five_and_six_fields() {
        assert!(cron_to_schedule("*/5 * * * *").is_ok());
        assert!(cron_to_schedule("0 0 3 * * *").is_ok());
        let error = cron_to_schedule("not a cron").unwrap_err();
        assert_eq!(error.to_string(), "invalid cron expression 'not a cron'");
    }

    #[tokio::test]
    async fn test_register_active_jobs_skips_inactive_and_is_idempotent() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        store.create_scheduled_job(&job_input("nightly", true, vec![])).await.unwrap();
        let mut dormant = job_input("dormant", true, vec![]);
        dormant.is_active = false;
        store.create_scheduled_job(&dormant).await.unwrap();

        let dispatcher = dispatcher(&store, &queue);
        assert_eq!(dispatcher.register_active_jobs().await.unwrap(), 1);
        assert_eq!(dispatcher.registered_count(), 1);

        // Re-registering replaces the entry instead of stacking a second one.
        assert_eq!(dispatcher.register_active_jobs().await.unwrap(), 1);
        assert_eq!(dispatcher.registered_count(), 1);
    }

    #[tokio::test]
    async fn test_schedule_job_rejects_bad_cron() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let mut input = job_input("broken", true, vec![]);
        input.cron_expression = "whenever".to_string();
        let job = store.create_scheduled_job(&input).await.unwrap();

        let dispatcher = dispatcher(&store, &queue);
        assert!(dispatcher.schedule_job(job.id).await.is_err());
        assert_eq!(dispatcher.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_run_job_now_targets_all_machines() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        store.add_machine("ws-a");
        store.add_machine("ws-b");
        let job = store
            .create_scheduled_job(&job_input("sweep", true, vec![]))
            .await
            .unwrap();

        let dispatcher = dispatcher(&store, &queue);
        let (fired, machines) = dispatcher.run_job_now(job.id).await.unwrap().unwrap();
        assert_eq!(fired.id, job.id);
        assert_eq!(machines.len(), 2);

        let tasks = queue.tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.job_kind == JobKind::FullCheck));
        assert!(tasks.iter().all(|t| t.scheduled_job_id == Some(job.id)));

        let job = store.get_scheduled_job(job.id).await.unwrap().unwrap();
        assert!(job.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_run_job_now_honors_explicit_targets() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let a = store.add_machine("ws-a");
        store.add_machine("ws-b");
        let job = store
            .create_scheduled_job(&job_input("narrow", false, vec![a.id]))
            .await
            .unwrap();

        let dispatcher = dispatcher(&store, &queue);
        let (_, machines) = dispatcher.run_job_now(job.id).await.unwrap().unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(queue.tasks()[0].machine_id, a.id);
    }

    #[tokio::test]
    async fn test_run_job_now_for_missing_job() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let dispatcher = dispatcher(&store, &queue);
        assert!(dispatcher.run_job_now(Uuid::new_v4()).await.unwrap().is_none());
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_fire_due_jobs_fires_once_per_occurrence() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        store.add_machine("ws-a");
        let mut input = job_input("minutely", true, vec![]);
        input.cron_expression = "* * * * *".to_string();
        let job = store.create_scheduled_job(&input).await.unwrap();

        let dispatcher = dispatcher(&store, &queue);
        dispatcher.schedule_job(job.id).await.unwrap();

        // Two minutes from now is safely past the first occurrence.
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(dispatcher.fire_due_jobs(later).await.unwrap(), 1);
        assert_eq!(queue.tasks().len(), 1);
        assert!(store.audit_types().contains(&"SCHEDULED_JOB_PROCESSING".to_string()));

        // The entry advanced past `later`, so the same poll instant does
        // not fire it again.
        assert_eq!(dispatcher.fire_due_jobs(later).await.unwrap(), 0);
        assert_eq!(queue.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_fired_job_gone_inactive_unschedules_itself() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        store.add_machine("ws-a");
        let mut input = job_input("retired", true, vec![]);
        input.cron_expression = "* * * * *".to_string();
        let job = store.create_scheduled_job(&input).await.unwrap();

        let dispatcher = dispatcher(&store, &queue);
        dispatcher.schedule_job(job.id).await.unwrap();

        input.is_active = false;
        store.update_scheduled_job(job.id, &input).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(dispatcher.fire_due_jobs(later).await.unwrap(), 0);
        assert!(queue.tasks().is_empty());
        assert_eq!(dispatcher.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_fire_with_no_targets_is_a_quiet_no_op() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let mut input = job_input("idle", false, vec![]);
        input.cron_expression = "* * * * *".to_string();
        let job = store.create_scheduled_job(&input).await.unwrap();

        let dispatcher = dispatcher(&store, &queue);
        dispatcher.schedule_job(job.id).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(120);
        dispatcher.fire_due_jobs(later).await.unwrap();
        assert!(queue.tasks().is_empty());
        assert!(!store.audit_types().contains(&"SCHEDULED_JOB_PROCESSING".to_string()));
    }

    #[tokio::test]
    async fn test_trigger_check_enqueues_untagged_task() {
        let store = Arc::new(MemStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let machine = store.add_machine("ws-a");

        let dispatcher = dispatcher(&store, &queue);
        dispatcher
            .trigger_check(machine.id, JobKind::Ping, CheckRequest::AllActive)
            .await
            .unwrap();

        let tasks = queue.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].job_kind, JobKind::Ping);
        assert_eq!(tasks[0].scheduled_job_id, None);
    }
}
