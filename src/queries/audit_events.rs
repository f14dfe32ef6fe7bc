use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::audit::AuditEvent;

pub async fn insert_audit_event(pool: &PgPool, event: &AuditEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events
            (event_type, level, message, machine_id, entity_type, entity_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&event.event_type)
    .bind(event.level.to_string())
    .bind(&event.message)
    .bind(event.machine_id)
    .bind(event.entity_type.as_deref())
    .bind(event.entity_id.as_deref())
    .bind(&event.metadata)
    .execute(pool)
    .await
    .context("Failed to insert audit event")?;
    Ok(())
}
