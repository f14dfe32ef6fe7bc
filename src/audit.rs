//! Audit trail for queue, scheduler, and API activity.
//!
//! Events are plain rows in `audit_events`. Writes are best-effort: a failed
//! audit insert is logged and swallowed so it can never abort the operation
//! it describes.

use std::fmt;

use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// A single audit record, built up with the chained setters below.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub level: AuditLevel,
    pub message: String,
    pub machine_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            level: AuditLevel::Info,
            message: message.into(),
            machine_id: None,
            entity_type: None,
            entity_id: None,
            metadata: json!({}),
        }
    }

    pub fn level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    pub fn machine(mut self, machine_id: Uuid) -> Self {
        self.machine_id = Some(machine_id);
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Persists an audit event through the store. Failures are logged, never
/// propagated.
pub async fn log_audit_event(store: &dyn Store, event: AuditEvent) {
    let event_type = event.event_type.clone();
    if let Err(e) = store.insert_audit_event(&event).await {
        warn!("Failed to write audit event {event_type}: {e}");
    }
}
