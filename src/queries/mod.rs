//! Runtime SQL for the Postgres store, one module per entity.

pub mod audit_events;
pub mod check_results;
pub mod checks;
pub mod machines;
pub mod scheduled_jobs;
