use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Machine, ScheduledJob, ScheduledJobInput};

pub async fn get_all_scheduled_jobs(pool: &PgPool) -> Result<Vec<ScheduledJob>> {
    let jobs = sqlx::query_as::<_, ScheduledJob>("SELECT * FROM scheduled_jobs ORDER BY name")
        .fetch_all(pool)
        .await
        .context("Failed to fetch scheduled jobs")?;
    Ok(jobs)
}

pub async fn get_active_scheduled_jobs(pool: &PgPool) -> Result<Vec<ScheduledJob>> {
    let jobs = sqlx::query_as::<_, ScheduledJob>(
        "SELECT * FROM scheduled_jobs WHERE is_active ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch active scheduled jobs")?;
    Ok(jobs)
}

pub async fn get_scheduled_job_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ScheduledJob>> {
    let job = sqlx::query_as::<_, ScheduledJob>("SELECT * FROM scheduled_jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch scheduled job by id")?;
    Ok(job)
}

pub async fn insert_scheduled_job(
    pool: &PgPool,
    input: &ScheduledJobInput,
) -> Result<ScheduledJob> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let job = sqlx::query_as::<_, ScheduledJob>(
        r#"
        INSERT INTO scheduled_jobs (name, job_type, cron_expression, target_all, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.job_type)
    .bind(&input.cron_expression)
    .bind(input.target_all)
    .bind(input.is_active)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to insert scheduled job")?;

    replace_job_targets(&mut tx, job.id, &input.target_machine_ids).await?;
    tx.commit().await.context("Failed to commit scheduled job insert")?;
    Ok(job)
}

pub async fn update_scheduled_job(
    pool: &PgPool,
    id: Uuid,
    input: &ScheduledJobInput,
) -> Result<Option<ScheduledJob>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let job = sqlx::query_as::<_, ScheduledJob>(
        r#"
        UPDATE scheduled_jobs SET
            name = $1,
            job_type = $2,
            cron_expression = $3,
            target_all = $4,
            is_active = $5,
            updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.job_type)
    .bind(&input.cron_expression)
    .bind(input.target_all)
    .bind(input.is_active)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to update scheduled job")?;

    let Some(job) = job else {
        return Ok(None);
    };
    replace_job_targets(&mut tx, job.id, &input.target_machine_ids).await?;
    tx.commit().await.context("Failed to commit scheduled job update")?;
    Ok(Some(job))
}

async fn replace_job_targets(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job_id: Uuid,
    machine_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("DELETE FROM scheduled_job_machines WHERE scheduled_job_id = $1")
        .bind(job_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear job targets")?;
    for machine_id in machine_ids {
        sqlx::query(
            r#"
            INSERT INTO scheduled_job_machines (scheduled_job_id, machine_id)
            VALUES ($1, $2) ON CONFLICT DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(machine_id)
        .execute(&mut **tx)
        .await
        .context("Failed to insert job target")?;
    }
    Ok(())
}

pub async fn delete_scheduled_job(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete scheduled job")?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_job_target_machines(pool: &PgPool, job_id: Uuid) -> Result<Vec<Machine>> {
    let machines = sqlx::query_as::<_, Machine>(
        r#"
        SELECT m.*
        FROM machines m
        JOIN scheduled_job_machines t ON t.machine_id = m.id
        WHERE t.scheduled_job_id = $1
        ORDER BY m.hostname
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch job target machines")?;
    Ok(machines)
}

pub async fn get_job_target_ids(pool: &PgPool, job_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT machine_id FROM scheduled_job_machines WHERE scheduled_job_id = $1",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch job target ids")?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn touch_job_last_run(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE scheduled_jobs SET last_run_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to stamp job last run")?;
    Ok(())
}
