use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::tasks::JobKind;

/// Append-only observation fact. The latest row per
/// `(machine_id, check_type, check_name)` is the current value of that
/// observation; older rows are history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub check_type: String, // Will be converted to/from JobKind enum
    pub check_name: String,
    pub status: String, // Will be converted to/from CheckStatus enum
    pub result_data: serde_json::Value,
    pub message: Option<String>,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for one result row, typed at the executor boundary and
/// bound as strings by the store.
#[derive(Debug, Clone)]
pub struct NewCheckResult {
    pub machine_id: Uuid,
    pub check_type: JobKind,
    pub check_name: String,
    pub status: CheckStatus,
    pub result_data: serde_json::Value,
    pub message: Option<String>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Success,
    Warning,
    Failed,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Success => write!(f, "SUCCESS"),
            CheckStatus::Warning => write!(f, "WARNING"),
            CheckStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for CheckStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(CheckStatus::Success),
            "WARNING" => Ok(CheckStatus::Warning),
            "FAILED" => Ok(CheckStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid check status: {}", s)),
        }
    }
}

/// Ephemeral polling contract entry: the result row a caller should wait
/// for. Never persisted. `machine_id` is a string because direct-mode scans
/// use a synthetic `manual:<uuid>` target id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedObject {
    pub machine_id: String,
    pub check_type: String,
    pub check_name: String,
}

impl ExpectedObject {
    pub fn new(machine_id: impl Into<String>, check_type: JobKind, check_name: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            check_type: check_type.to_string(),
            check_name: check_name.into(),
        }
    }
}
