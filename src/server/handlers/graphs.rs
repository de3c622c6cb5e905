//! Tree visualization endpoints for the two ensemble algorithms.
//!
//! The caller addresses trees with a 1-based index. The selected tree is
//! rendered to a fixed-size raster image and returned base64-encoded.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState, Result};
use crate::estimators::DecisionTree;
use crate::registry::{Algorithm, TrainedModel};
use crate::viz;

#[derive(Deserialize)]
pub struct GraphRequest {
    tree_index: Option<Value>,
}

/// The index arrives as arbitrary JSON so a non-integer value can be
/// reported distinctly from a missing one.
fn parse_tree_index(raw: Option<Value>) -> Result<usize> {
    let raw = raw.ok_or(ApiError::MissingField("tree_index"))?;
    let index = raw
        .as_i64()
        .ok_or_else(|| ApiError::InvalidParameter("tree_index must be an integer".to_string()))?;
    if index < 1 {
        return Err(ApiError::InvalidParameter("tree_index out of range".to_string()));
    }
    Ok((index - 1) as usize)
}

fn render_response(tree: &DecisionTree) -> Result<Json<Value>> {
    let image = viz::render_tree(tree)?;
    let image_base64 = viz::encode_png_base64(&image)?;
    Ok(Json(json!({ "image_base64": image_base64 })))
}

pub async fn graph_random_forest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GraphRequest>,
) -> Result<Json<Value>> {
    let entry = state
        .registry
        .get(Algorithm::RandomForest)
        .ok_or(ApiError::NotTrained(Algorithm::RandomForest))?;
    let index = parse_tree_index(req.tree_index)?;

    let TrainedModel::RandomForest(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    let tree = model
        .tree(index)
        .ok_or_else(|| ApiError::InvalidParameter("tree_index out of range".to_string()))?;
    render_response(tree)
}

pub async fn graph_grad_boost_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GraphRequest>,
) -> Result<Json<Value>> {
    let entry = state
        .registry
        .get(Algorithm::GradBoostReg)
        .ok_or(ApiError::NotTrained(Algorithm::GradBoostReg))?;
    let index = parse_tree_index(req.tree_index)?;

    let TrainedModel::GradBoostReg(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    let tree = model
        .tree(index)
        .ok_or_else(|| ApiError::InvalidParameter("tree_index out of range".to_string()))?;
    render_response(tree)
}
