//! Pure check evaluators.
//!
//! Each evaluator turns a declared expectation plus a raw probe result into
//! `{status, data, message?}` with no I/O, so they can be unit-tested
//! against literal fixtures. Two deliberate asymmetries are load-bearing: a
//! registry value *mismatch* is a WARNING while a missing key is FAILED,
//! and file checks gate on existence only — attribute fields are
//! informational.

use serde_json::{Value, json};

use crate::models::CheckStatus;
use crate::probe::ProbeResult;

/// Evaluator output; the caller pairs it with the probe duration when
/// building a result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: CheckStatus,
    pub data: Value,
    pub message: Option<String>,
}

/// Tolerant reparse of probe stdout. Probe scripts emit JSON, but custom
/// scripts and quser-style tables produce arbitrary text; those pass
/// through as scalars rather than failing the check.
pub fn parse_result_data(output: Option<&str>) -> Value {
    let trimmed = output.unwrap_or("").trim();
    if trimmed.is_empty() {
        return json!({});
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    match trimmed.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return json!(f);
        }
    }

    Value::String(trimmed.to_string())
}

fn trimmed_error(ps: &ProbeResult) -> Option<String> {
    ps.error
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The `exists` flag only counts when the data is a JSON object carrying a
/// literal boolean; anything else means the probe did not report existence.
fn reported_exists(data: &Value) -> Option<bool> {
    match data {
        Value::Object(map) => match map.get("exists") {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        },
        _ => None,
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Direct success mapping for probes without an expectation (ping, user
/// info, system info, custom scripts).
pub fn evaluate_plain(ps: &ProbeResult) -> Evaluation {
    Evaluation {
        status: if ps.success {
            CheckStatus::Success
        } else {
            CheckStatus::Failed
        },
        data: parse_result_data(Some(&ps.output)),
        message: trimmed_error(ps),
    }
}

pub fn evaluate_registry_check(
    value_name: Option<&str>,
    expected_value: Option<&str>,
    ps: &ProbeResult,
) -> Evaluation {
    let data = parse_result_data(Some(&ps.output));

    // Default: "did the probe execute?"
    let mut status = if ps.success {
        CheckStatus::Success
    } else {
        CheckStatus::Failed
    };
    let mut message = trimmed_error(ps);

    // A probe that reports absence fails regardless of how it exited.
    let exists = reported_exists(&data);
    if exists == Some(false) {
        status = CheckStatus::Failed;
        message = message.or_else(|| Some("Registry path/value not found".to_string()));
    }

    let has_value_name = value_name.map(str::trim).is_some_and(|s| !s.is_empty());

    // Only compare the expected value when a value name was declared and the
    // key/value actually exists. An empty expected string still counts as a
    // declared expectation.
    if status != CheckStatus::Failed
        && expected_value.is_some()
        && has_value_name
        && exists == Some(true)
    {
        let actual = data.get("value");
        let expected = expected_value.unwrap_or("");
        if display_value(actual) != expected {
            status = CheckStatus::Warning;
            message = Some(format!(
                "Expected \"{}\" but got \"{}\"",
                expected,
                display_value(actual)
            ));
        }
    }

    Evaluation { status, data, message }
}

pub fn evaluate_file_check(check_exists: Option<bool>, ps: &ProbeResult) -> Evaluation {
    let data = parse_result_data(Some(&ps.output));

    let mut status = if ps.success {
        CheckStatus::Success
    } else {
        CheckStatus::Failed
    };
    let mut message = trimmed_error(ps);

    let exists = reported_exists(&data);
    let expect_exists = check_exists != Some(false); // default true

    if exists == Some(true) && !expect_exists {
        status = CheckStatus::Failed;
        message =
            message.or_else(|| Some("Expected path to be missing, but it exists".to_string()));
    } else if exists == Some(false) && expect_exists {
        status = CheckStatus::Failed;
        message = message.or_else(|| Some("File/path not found".to_string()));
    }

    Evaluation { status, data, message }
}

pub fn evaluate_service_check(expected_status: Option<&str>, ps: &ProbeResult) -> Evaluation {
    let data = parse_result_data(Some(&ps.output));

    let mut status = if ps.success {
        CheckStatus::Success
    } else {
        CheckStatus::Failed
    };
    let mut message = trimmed_error(ps);

    let exists = reported_exists(&data);
    if exists == Some(false) {
        status = CheckStatus::Failed;
        message = message.or_else(|| Some("Service not found".to_string()));
    }

    // "Tracking" records the state for trend visibility without ever gating
    // health on it.
    if status != CheckStatus::Failed && exists == Some(true) {
        match expected_status.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("Tracking") => {}
            Some(expected) => {
                let actual = data.get("status");
                if display_value(actual) != expected {
                    status = CheckStatus::Failed;
                    message = Some(format!(
                        "Expected \"{}\" but got \"{}\"",
                        expected,
                        display_value(actual)
                    ));
                }
            }
        }
    }

    Evaluation { status, data, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ps_ok(output: &str) -> ProbeResult {
        ProbeResult {
            success: true,
            output: output.to_string(),
            error: None,
            duration_ms: 12,
        }
    }

    fn ps_err(output: &str, error: &str) -> ProbeResult {
        ProbeResult {
            success: false,
            output: output.to_string(),
            error: Some(error.to_string()),
            duration_ms: 12,
        }
    }

    #[test]
    fn parse_keeps_json_objects() {
        let parsed = parse_result_data(Some(r#"{"exists": true, "value": "10"}"#));
        assert_eq!(parsed, json!({"exists": true, "value": "10"}));
    }

    #[test]
    fn parse_maps_bare_booleans_case_insensitively() {
        assert_eq!(parse_result_data(Some("FALSE")), Value::Bool(false));
        assert_eq!(parse_result_data(Some("True")), Value::Bool(true));
    }

    #[test]
    fn parse_maps_numeric_strings() {
        assert_eq!(parse_result_data(Some("42")), json!(42));
        assert_eq!(parse_result_data(Some("4.5")), json!(4.5));
    }

    #[test]
    fn parse_passes_raw_text_through() {
        assert_eq!(
            parse_result_data(Some("DOMAIN\\alice logged on")),
            Value::String("DOMAIN\\alice logged on".to_string())
        );
        assert_eq!(parse_result_data(Some("   ")), json!({}));
        assert_eq!(parse_result_data(None), json!({}));
    }

    #[test]
    fn registry_missing_key_fails_even_when_probe_succeeded() {
        let eval = evaluate_registry_check(
            Some("Ver"),
            None,
            &ps_ok(r#"{"exists": false, "path": "HKEY_LOCAL_MACHINE\\Sw"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(eval.message.as_deref(), Some("Registry path/value not found"));
    }

    #[test]
    fn registry_existence_only_check_succeeds() {
        let eval = evaluate_registry_check(None, None, &ps_ok(r#"{"exists": true}"#));
        assert_eq!(eval.status, CheckStatus::Success);
        assert_eq!(eval.message, None);
    }

    #[test]
    fn registry_value_match_is_success() {
        let eval = evaluate_registry_check(
            Some("Ver"),
            Some("10"),
            &ps_ok(r#"{"exists": true, "value": "10"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);
    }

    #[test]
    fn registry_value_drift_is_a_warning_not_a_failure() {
        let eval = evaluate_registry_check(
            Some("Ver"),
            Some("10"),
            &ps_ok(r#"{"exists": true, "value": "11"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Warning);
        assert_eq!(
            eval.message.as_deref(),
            Some("Expected \"10\" but got \"11\"")
        );
        assert_eq!(eval.data, json!({"exists": true, "value": "11"}));
    }

    #[test]
    fn registry_numeric_values_compare_by_string_form() {
        let eval = evaluate_registry_check(
            Some("Ver"),
            Some("10"),
            &ps_ok(r#"{"exists": true, "value": 10}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);
    }

    #[test]
    fn registry_comparison_needs_a_value_name() {
        // Expected value declared but no value name: existence-only.
        let eval = evaluate_registry_check(
            None,
            Some("10"),
            &ps_ok(r#"{"exists": true, "value": "11"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);
        let eval = evaluate_registry_check(
            Some("   "),
            Some("10"),
            &ps_ok(r#"{"exists": true, "value": "11"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);
    }

    #[test]
    fn registry_failed_probe_never_upgrades_to_warning() {
        let eval = evaluate_registry_check(
            Some("Ver"),
            Some("10"),
            &ps_err(r#"{"exists": false}"#, "The network path was not found"),
        );
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(
            eval.message.as_deref(),
            Some("The network path was not found")
        );
    }

    #[test]
    fn file_present_when_expected_succeeds_regardless_of_attributes() {
        let eval = evaluate_file_check(
            Some(true),
            &ps_ok(r#"{"exists": true, "sizeBytes": 0, "isDirectory": false}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);
    }

    #[test]
    fn file_missing_when_expected_fails() {
        let eval = evaluate_file_check(None, &ps_ok(r#"{"exists": false, "path": "C:\\x"}"#));
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(eval.message.as_deref(), Some("File/path not found"));
    }

    #[test]
    fn file_absence_checks_invert_the_gate() {
        let eval = evaluate_file_check(Some(false), &ps_ok(r#"{"exists": false}"#));
        assert_eq!(eval.status, CheckStatus::Success);

        let eval = evaluate_file_check(Some(false), &ps_ok(r#"{"exists": true}"#));
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(
            eval.message.as_deref(),
            Some("Expected path to be missing, but it exists")
        );
    }

    #[test]
    fn service_state_match_succeeds_and_mismatch_fails() {
        let eval = evaluate_service_check(
            Some("Running"),
            &ps_ok(r#"{"exists": true, "status": "Running"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Success);

        let eval = evaluate_service_check(
            Some("Running"),
            &ps_ok(r#"{"exists": true, "status": "Stopped"}"#),
        );
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(
            eval.message.as_deref(),
            Some("Expected \"Running\" but got \"Stopped\"")
        );
    }

    #[test]
    fn service_tracking_never_gates_health() {
        for state in ["Running", "Stopped", "Paused"] {
            let output = format!(r#"{{"exists": true, "status": "{state}"}}"#);
            let eval = evaluate_service_check(Some("Tracking"), &ps_ok(&output));
            assert_eq!(eval.status, CheckStatus::Success);
        }
    }

    #[test]
    fn service_absence_fails() {
        let eval = evaluate_service_check(Some("Tracking"), &ps_ok(r#"{"exists": false}"#));
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(eval.message.as_deref(), Some("Service not found"));
    }

    #[test]
    fn plain_probe_maps_success_directly() {
        let eval = evaluate_plain(&ps_ok(r#"{"reachable": true}"#));
        assert_eq!(eval.status, CheckStatus::Success);
        assert_eq!(eval.data, json!({"reachable": true}));

        let eval = evaluate_plain(&ps_err("", "timed out"));
        assert_eq!(eval.status, CheckStatus::Failed);
        assert_eq!(eval.message.as_deref(), Some("timed out"));
    }
}
