use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Machine, MachinePatch};

pub async fn get_machine_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Machine>> {
    let machine = sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch machine by id")?;
    Ok(machine)
}

pub async fn get_machines_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Machine>> {
    let machines = sqlx::query_as::<_, Machine>(
        "SELECT * FROM machines WHERE id = ANY($1) ORDER BY hostname",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch machines by ids")?;
    Ok(machines)
}

pub async fn get_all_machines(pool: &PgPool) -> Result<Vec<Machine>> {
    let machines = sqlx::query_as::<_, Machine>("SELECT * FROM machines ORDER BY hostname")
        .fetch_all(pool)
        .await
        .context("Failed to fetch machines")?;
    Ok(machines)
}

/// Applies only the fields the patch carries; untouched columns keep their
/// current value.
pub async fn update_machine(pool: &PgPool, id: Uuid, patch: &MachinePatch) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE machines SET
            status = COALESCE($1, status),
            last_seen = COALESCE($2, last_seen),
            pc_model = COALESCE($3, pc_model),
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(patch.status.map(|s| s.to_string()))
    .bind(patch.last_seen)
    .bind(patch.pc_model.as_deref())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update machine")?;
    Ok(())
}

pub async fn count_machines(pool: &PgPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM machines")
        .fetch_one(pool)
        .await
        .context("Failed to count machines")?;
    Ok(count.0)
}
