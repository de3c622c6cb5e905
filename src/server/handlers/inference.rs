//! Single-row inference endpoints.
//!
//! Every response wraps the prediction as a one-element list to keep the
//! shape uniform with potential batch prediction.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{json_label, require_field, ApiError, AppState, Result};
use crate::registry::{Algorithm, TrainedModel};
use crate::tabular::{self, JsonRow};

#[derive(Deserialize)]
pub struct InferRequest {
    features: Option<JsonRow>,
}

/// Registry lookup comes first: an untrained model is reported even when the
/// request row is also missing.
fn infer_one(state: &AppState, algorithm: Algorithm, req: InferRequest) -> Result<f64> {
    let entry = state
        .registry
        .get(algorithm)
        .ok_or(ApiError::NotTrained(algorithm))?;
    let row = require_field(req.features, "features")?;
    let x = tabular::row_to_matrix(&row, &entry.features)?;

    let prediction = match &entry.model {
        TrainedModel::LinReg(model) => model.predict(&x)?[0],
        TrainedModel::LogReg(model) => model.predict(&x)?[0],
        TrainedModel::RandomForest(model) => model.predict(&x)?[0],
        TrainedModel::GradBoostReg(model) => model.predict(&x)?[0],
        TrainedModel::KMeans { model, .. } => model.predict(&x)?[0] as f64,
    };
    Ok(prediction)
}

pub async fn infer_lin_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferRequest>,
) -> Result<Json<Value>> {
    let prediction = infer_one(&state, Algorithm::LinReg, req)?;
    Ok(Json(json!({ "prediction": [prediction] })))
}

pub async fn infer_log_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferRequest>,
) -> Result<Json<Value>> {
    let label = infer_one(&state, Algorithm::LogReg, req)?;
    Ok(Json(json!({ "prediction": [json_label(label)] })))
}

pub async fn infer_random_forest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferRequest>,
) -> Result<Json<Value>> {
    let label = infer_one(&state, Algorithm::RandomForest, req)?;
    Ok(Json(json!({ "prediction": [json_label(label)] })))
}

pub async fn infer_grad_boost_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferRequest>,
) -> Result<Json<Value>> {
    let prediction = infer_one(&state, Algorithm::GradBoostReg, req)?;
    Ok(Json(json!({ "prediction": [prediction] })))
}

pub async fn infer_k_means(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InferRequest>,
) -> Result<Json<Value>> {
    let cluster = infer_one(&state, Algorithm::KMeans, req)?;
    Ok(Json(json!({ "prediction": [cluster as i64] })))
}
