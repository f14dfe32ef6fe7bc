use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A Windows host under observation. Rows are owned by the inventory CRUD
/// layer; this engine only reads them and patches status fields.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Uuid,
    pub hostname: String,
    pub ip_address: String,
    pub status: String, // Will be converted to/from MachineStatus enum
    pub pc_model: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    Online,
    Warning,
    Error,
    Offline,
    Unknown,
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineStatus::Online => write!(f, "ONLINE"),
            MachineStatus::Warning => write!(f, "WARNING"),
            MachineStatus::Error => write!(f, "ERROR"),
            MachineStatus::Offline => write!(f, "OFFLINE"),
            MachineStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for MachineStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(MachineStatus::Online),
            "WARNING" => Ok(MachineStatus::Warning),
            "ERROR" => Ok(MachineStatus::Error),
            "OFFLINE" => Ok(MachineStatus::Offline),
            "UNKNOWN" => Ok(MachineStatus::Unknown),
            _ => Err(anyhow::anyhow!("Invalid machine status: {}", s)),
        }
    }
}

/// Partial machine update produced by one executed task. The executor builds
/// it from the batch outcome and applies it exactly once at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachinePatch {
    pub status: Option<MachineStatus>,
    pub last_seen: Option<DateTime<Utc>>,
    pub pc_model: Option<String>,
}

impl MachinePatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.last_seen.is_none() && self.pc_model.is_none()
    }
}
