use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CheckResult, NewCheckResult};

pub async fn insert_check_result(pool: &PgPool, row: &NewCheckResult) -> Result<CheckResult> {
    let result = sqlx::query_as::<_, CheckResult>(
        r#"
        INSERT INTO check_results
            (machine_id, check_type, check_name, status, result_data, message, duration_ms)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(row.machine_id)
    .bind(row.check_type.to_string())
    .bind(&row.check_name)
    .bind(row.status.to_string())
    .bind(&row.result_data)
    .bind(row.message.as_deref())
    .bind(row.duration_ms)
    .fetch_one(pool)
    .await
    .context("Failed to insert check result")?;
    Ok(result)
}

/// Latest row per (machine, check type, check name) key, optionally bounded
/// below by `since`. A key with no qualifying row is simply absent.
pub async fn get_latest_results(
    pool: &PgPool,
    machine_ids: &[Uuid],
    since: Option<DateTime<Utc>>,
) -> Result<Vec<CheckResult>> {
    let results = sqlx::query_as::<_, CheckResult>(
        r#"
        SELECT DISTINCT ON (machine_id, check_type, check_name) *
        FROM check_results
        WHERE machine_id = ANY($1)
          AND ($2::timestamptz IS NULL OR created_at >= $2)
        ORDER BY machine_id, check_type, check_name, created_at DESC
        "#,
    )
    .bind(machine_ids)
    .bind(since)
    .fetch_all(pool)
    .await
    .context("Failed to fetch latest check results")?;
    Ok(results)
}

pub async fn count_check_results(pool: &PgPool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM check_results")
        .fetch_one(pool)
        .await
        .context("Failed to count check results")?;
    Ok(count.0)
}
