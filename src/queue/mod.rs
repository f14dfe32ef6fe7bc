//! Background check queue.
//!
//! Tasks flow through a [`TaskQueue`] capability so handlers and the
//! dispatcher never spawn probe work themselves. The production
//! [`WorkerQueue`] fans tasks out to a fixed pool of workers sharing one
//! receiver; each worker retries a failing task with exponential backoff
//! before declaring it terminally failed.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::executor::CheckExecutor;
use crate::models::BatchOutcome;
use crate::models::CheckTask;
use crate::models::config::QueueConfig;

/// Terminal outcome of a queued task, delivered to registered listeners.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Completed {
        task: CheckTask,
        outcome: BatchOutcome,
    },
    Failed {
        task: CheckTask,
        attempts: u32,
        error: String,
    },
}

pub type EventListener = Box<dyn Fn(&QueueEvent) + Send + Sync>;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Hands a task to the queue. Returns an error only when the queue is
    /// no longer accepting work.
    async fn enqueue(&self, task: CheckTask) -> Result<()>;

    /// Registers a listener for terminal task events. Listeners run on the
    /// worker that finished the task and must not block.
    fn on_event(&self, listener: EventListener);
}

pub struct WorkerQueue {
    tx: mpsc::UnboundedSender<CheckTask>,
    listeners: Arc<Mutex<Vec<EventListener>>>,
}

impl WorkerQueue {
    /// Spawns `cfg.concurrency` workers over a shared channel and returns
    /// the queue handle.
    pub fn start(cfg: &QueueConfig, executor: Arc<CheckExecutor>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(AsyncMutex::new(rx));
        let listeners: Arc<Mutex<Vec<EventListener>>> = Arc::new(Mutex::new(Vec::new()));

        for worker_id in 0..cfg.concurrency {
            tokio::spawn(run_worker(
                worker_id,
                rx.clone(),
                executor.clone(),
                cfg.clone(),
                listeners.clone(),
            ));
        }
        info!(
            "🔄 Check queue started with {} workers (max {} attempts per task)",
            cfg.concurrency, cfg.max_attempts
        );

        Arc::new(Self { tx, listeners })
    }
}

#[async_trait]
impl TaskQueue for WorkerQueue {
    async fn enqueue(&self, task: CheckTask) -> Result<()> {
        self.tx
            .send(task)
            .map_err(|_| anyhow!("check queue is shut down"))
    }

    fn on_event(&self, listener: EventListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<CheckTask>>>,
    executor: Arc<CheckExecutor>,
    cfg: QueueConfig,
    listeners: Arc<Mutex<Vec<EventListener>>>,
) {
    debug!("Check worker {worker_id} started");
    loop {
        let task = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            debug!("Check worker {worker_id} shutting down");
            break;
        };
        process_task(&executor, task, &cfg, &listeners).await;
    }
}

/// Runs one task to a terminal state, retrying transient failures with
/// exponential backoff (base delay doubles per attempt).
async fn process_task(
    executor: &CheckExecutor,
    task: CheckTask,
    cfg: &QueueConfig,
    listeners: &Mutex<Vec<EventListener>>,
) {
    let mut attempt: u32 = 1;
    loop {
        match executor.run_task(&task).await {
            Ok(outcome) => {
                info!(
                    "✅ {} completed for machine {} ({} checks)",
                    task.job_kind, task.machine_id, outcome.checks_run
                );
                emit(listeners, &QueueEvent::Completed { task, outcome });
                return;
            }
            Err(error) if attempt < cfg.max_attempts => {
                let delay = cfg.backoff * 2u32.pow(attempt - 1);
                warn!(
                    "🔁 {} for machine {} failed (attempt {attempt}/{}): {error:#}; retrying in {delay:?}",
                    task.job_kind, task.machine_id, cfg.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                error!(
                    "❌ {} for machine {} failed after {attempt} attempts: {error:#}",
                    task.job_kind, task.machine_id
                );
                emit(
                    listeners,
                    &QueueEvent::Failed {
                        task,
                        attempts: attempt,
                        error: format!("{error:#}"),
                    },
                );
                return;
            }
        }
    }
}

fn emit(listeners: &Mutex<Vec<EventListener>>, event: &QueueEvent) {
    for listener in listeners.lock().unwrap().iter() {
        listener(event);
    }
}
