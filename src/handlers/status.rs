use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::handlers::FwState;

pub async fn health(State(state): State<FwState>) -> Json<Value> {
    let machines = state.store().count_machines().await;
    let database = if machines.is_ok() { "healthy" } else { "unhealthy" };
    let machines = machines.unwrap_or(0);
    let check_results = state.store().count_check_results().await.unwrap_or(0);

    Json(json!({
        "service": "Fleetward",
        "status": "running",
        "database": database,
        "stats": {
            "machines": machines,
            "checkResults": check_results,
            "scheduledJobs": state.dispatcher().registered_count(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
