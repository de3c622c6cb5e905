//! Request handlers, grouped by concern.

pub mod data;
pub mod graphs;
pub mod inference;
pub mod persistence;
pub mod training;

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::error::{ApiError, Result};
use super::state::AppState;

/// Unwrap an optional request field or fail with MissingField.
fn require_field<T>(value: Option<T>, name: &'static str) -> Result<T> {
    value.ok_or(ApiError::MissingField(name))
}

/// A required string field; empty counts as absent.
fn require_string(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ApiError::MissingField(name)),
    }
}

/// A required list field; empty counts as absent.
fn require_list<T>(value: Option<Vec<T>>, name: &'static str) -> Result<Vec<T>> {
    match value {
        Some(list) if !list.is_empty() => Ok(list),
        _ => Err(ApiError::MissingField(name)),
    }
}

/// Class labels are stored as f64 but presented as integers when integral,
/// matching how they arrive in training data.
fn format_label(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn json_label(value: f64) -> Value {
    if value.fract() == 0.0 && value.is_finite() {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime.num_seconds(),
    }))
}
