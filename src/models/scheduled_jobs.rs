use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recurring dispatch definition. One active row maps 1:1 to one cron
/// registration keyed `scheduled-<id>`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: Uuid,
    pub name: String,
    pub job_type: String, // Will be converted to/from JobKind enum
    pub cron_expression: String,
    pub target_all: bool,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert/update payload for a scheduled job, validated by the handlers
/// before it reaches the store.
#[derive(Debug, Clone)]
pub struct ScheduledJobInput {
    pub name: String,
    pub job_type: String,
    pub cron_expression: String,
    pub target_all: bool,
    pub is_active: bool,
    pub target_machine_ids: Vec<Uuid>,
}
