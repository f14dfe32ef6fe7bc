//! Check-definition lookups. Every listing sorts by name so bulk runs walk
//! their checks in a deterministic order.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{FileCheck, RegistryCheck, ServiceCheck, SystemCheck, UserCheck};

pub async fn get_active_registry_checks(pool: &PgPool) -> Result<Vec<RegistryCheck>> {
    let checks = sqlx::query_as::<_, RegistryCheck>(
        "SELECT * FROM registry_checks WHERE is_active ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch active registry checks")?;
    Ok(checks)
}

pub async fn get_registry_check_by_id(pool: &PgPool, id: Uuid) -> Result<Option<RegistryCheck>> {
    let check = sqlx::query_as::<_, RegistryCheck>("SELECT * FROM registry_checks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch registry check by id")?;
    Ok(check)
}

pub async fn get_registry_checks_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<RegistryCheck>> {
    let checks = sqlx::query_as::<_, RegistryCheck>(
        "SELECT * FROM registry_checks WHERE id = ANY($1) ORDER BY name",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch registry checks by ids")?;
    Ok(checks)
}

pub async fn get_active_file_checks(pool: &PgPool) -> Result<Vec<FileCheck>> {
    let checks =
        sqlx::query_as::<_, FileCheck>("SELECT * FROM file_checks WHERE is_active ORDER BY name")
            .fetch_all(pool)
            .await
            .context("Failed to fetch active file checks")?;
    Ok(checks)
}

pub async fn get_file_check_by_id(pool: &PgPool, id: Uuid) -> Result<Option<FileCheck>> {
    let check = sqlx::query_as::<_, FileCheck>("SELECT * FROM file_checks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch file check by id")?;
    Ok(check)
}

pub async fn get_file_checks_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<FileCheck>> {
    let checks = sqlx::query_as::<_, FileCheck>(
        "SELECT * FROM file_checks WHERE id = ANY($1) ORDER BY name",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch file checks by ids")?;
    Ok(checks)
}

pub async fn get_active_service_checks(pool: &PgPool) -> Result<Vec<ServiceCheck>> {
    let checks = sqlx::query_as::<_, ServiceCheck>(
        "SELECT * FROM service_checks WHERE is_active ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch active service checks")?;
    Ok(checks)
}

pub async fn get_service_check_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ServiceCheck>> {
    let check = sqlx::query_as::<_, ServiceCheck>("SELECT * FROM service_checks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch service check by id")?;
    Ok(check)
}

pub async fn get_service_checks_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<ServiceCheck>> {
    let checks = sqlx::query_as::<_, ServiceCheck>(
        "SELECT * FROM service_checks WHERE id = ANY($1) ORDER BY name",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch service checks by ids")?;
    Ok(checks)
}

pub async fn get_active_user_checks(pool: &PgPool) -> Result<Vec<UserCheck>> {
    let checks =
        sqlx::query_as::<_, UserCheck>("SELECT * FROM user_checks WHERE is_active ORDER BY name")
            .fetch_all(pool)
            .await
            .context("Failed to fetch active user checks")?;
    Ok(checks)
}

pub async fn get_user_check_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserCheck>> {
    let check = sqlx::query_as::<_, UserCheck>("SELECT * FROM user_checks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user check by id")?;
    Ok(check)
}

pub async fn get_user_checks_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<UserCheck>> {
    let checks = sqlx::query_as::<_, UserCheck>(
        "SELECT * FROM user_checks WHERE id = ANY($1) ORDER BY name",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch user checks by ids")?;
    Ok(checks)
}

pub async fn get_active_system_checks(pool: &PgPool) -> Result<Vec<SystemCheck>> {
    let checks = sqlx::query_as::<_, SystemCheck>(
        "SELECT * FROM system_checks WHERE is_active ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch active system checks")?;
    Ok(checks)
}

pub async fn get_system_check_by_id(pool: &PgPool, id: Uuid) -> Result<Option<SystemCheck>> {
    let check = sqlx::query_as::<_, SystemCheck>("SELECT * FROM system_checks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch system check by id")?;
    Ok(check)
}

pub async fn get_system_checks_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<SystemCheck>> {
    let checks = sqlx::query_as::<_, SystemCheck>(
        "SELECT * FROM system_checks WHERE id = ANY($1) ORDER BY name",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("Failed to fetch system checks by ids")?;
    Ok(checks)
}
