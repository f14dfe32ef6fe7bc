//! Result lookup for scan polling.
//!
//! Clients that started a scan poll here with the expected-object list the
//! scan endpoints returned, narrowing until every object has a row.

use std::collections::HashSet;

use anyhow::Result;
use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::handlers::{FwState, internal_error};
use crate::models::CheckResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResultsRequest {
    #[serde(default)]
    pub machine_ids: Vec<Uuid>,
    #[serde(default)]
    pub objects: Vec<ResultObject>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultObject {
    pub check_type: String,
    pub check_name: String,
}

pub async fn latest_results(
    State(state): State<FwState>,
    Json(body): Json<LatestResultsRequest>,
) -> Response {
    match lookup(&state, &body).await {
        Ok(results) => Json(json!({ "results": results })).into_response(),
        Err(error) => internal_error(error),
    }
}

/// Latest row per (machine, check type, check name), restricted to the pairs
/// the client asked about. The store already collapses to one row per key;
/// the pair filter happens here because the pair list is request-shaped.
async fn lookup(state: &FwState, body: &LatestResultsRequest) -> Result<Vec<CheckResult>> {
    let mut results = state
        .store()
        .get_latest_results(&body.machine_ids, body.since)
        .await?;
    let wanted: HashSet<(&str, &str)> = body
        .objects
        .iter()
        .map(|object| (object.check_type.as_str(), object.check_name.as_str()))
        .collect();
    results.retain(|row| wanted.contains(&(row.check_type.as_str(), row.check_name.as_str())));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::JobDispatcher;
    use crate::models::{CheckStatus, JobKind, NewCheckResult};
    use crate::probe::scripted::ScriptedProbe;
    use crate::queue::recording::RecordingQueue;
    use crate::store::Store;
    use crate::store::memory::MemStore;
    use axum::{Router, routing::post};
    use axum_test::TestServer;
    use serde_json::Value;
    use std::sync::Arc;

    fn test_server(store: Arc<MemStore>) -> TestServer {
        let dispatcher = Arc::new(JobDispatcher::new(
            store.clone(),
            Arc::new(RecordingQueue::new()),
        ));
        let state = FwState::new(store, Arc::new(ScriptedProbe::new()), dispatcher);
        let app = Router::new()
            .route("/api/data/latest-results", post(latest_results))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    fn row(machine_id: Uuid, kind: JobKind, name: &str, status: CheckStatus) -> NewCheckResult {
        NewCheckResult {
            machine_id,
            check_type: kind,
            check_name: name.to_string(),
            status,
            result_data: json!({}),
            message: None,
            duration_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_newest_row_wins_per_object() {
        let store = Arc::new(MemStore::new());
        let machine = store.add_machine("ws-01");
        store
            .insert_check_result(&row(machine.id, JobKind::Ping, "Ping Test", CheckStatus::Failed))
            .await
            .unwrap();
        let newer = store
            .insert_check_result(&row(machine.id, JobKind::Ping, "Ping Test", CheckStatus::Success))
            .await
            .unwrap();
        let server = test_server(store);

        let response = server
            .post("/api/data/latest-results")
            .json(&json!({
                "machineIds": [machine.id],
                "objects": [{ "checkType": "PING", "checkName": "Ping Test" }],
            }))
            .await;
        assert_eq!(response.status_code(), 200);
        let results = response.json::<Value>()["results"].clone();
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["id"], json!(newer.id));
        assert_eq!(results[0]["status"], "SUCCESS");
    }

    #[tokio::test]
    async fn test_since_excludes_older_rows() {
        let store = Arc::new(MemStore::new());
        let machine = store.add_machine("ws-01");
        let old = store
            .insert_check_result(&row(machine.id, JobKind::Ping, "Ping Test", CheckStatus::Success))
            .await
            .unwrap();
        let since = old.created_at + chrono::Duration::milliseconds(1);
        let server = test_server(store);

        let response = server
            .post("/api/data/latest-results")
            .json(&json!({
                "machineIds": [machine.id],
                "objects": [{ "checkType": "PING", "checkName": "Ping Test" }],
                "since": since,
            }))
            .await;
        assert!(response.json::<Value>()["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_requested_objects_are_returned() {
        let store = Arc::new(MemStore::new());
        let machine = store.add_machine("ws-01");
        store
            .insert_check_result(&row(machine.id, JobKind::Ping, "Ping Test", CheckStatus::Success))
            .await
            .unwrap();
        store
            .insert_check_result(&row(
                machine.id,
                JobKind::FileCheck,
                "Agent Binary",
                CheckStatus::Success,
            ))
            .await
            .unwrap();
        let server = test_server(store);

        let response = server
            .post("/api/data/latest-results")
            .json(&json!({
                "machineIds": [machine.id],
                "objects": [{ "checkType": "FILE_CHECK", "checkName": "Agent Binary" }],
            }))
            .await;
        let results = response.json::<Value>()["results"].clone();
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["checkType"], "FILE_CHECK");
        assert_eq!(results[0]["checkName"], "Agent Binary");
    }

    #[tokio::test]
    async fn test_unlisted_machines_are_ignored() {
        let store = Arc::new(MemStore::new());
        let listed = store.add_machine("ws-01");
        let other = store.add_machine("ws-02");
        for machine_id in [listed.id, other.id] {
            store
                .insert_check_result(&row(machine_id, JobKind::Ping, "Ping Test", CheckStatus::Success))
                .await
                .unwrap();
        }
        let server = test_server(store);

        let response = server
            .post("/api/data/latest-results")
            .json(&json!({
                "machineIds": [listed.id],
                "objects": [{ "checkType": "PING", "checkName": "Ping Test" }],
            }))
            .await;
        let results = response.json::<Value>()["results"].clone();
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["machineId"], json!(listed.id));
    }
}
