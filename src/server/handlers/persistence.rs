//! Model archive endpoints: save, load, list, delete.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{require_field, require_list, require_string, ApiError, AppState, Result};
use crate::archive::{self, ModelMetadata, ARCHIVE_EXT};
use crate::registry::{Algorithm, RegistryEntry, TrainedModel};
use crate::tabular::{self, JsonRow};

const SAVE_OK: &str = "model, data, and metadata successfully saved and uploaded";

#[derive(Deserialize)]
pub struct SaveModelRequest {
    algo_name: Option<Algorithm>,
    model_name: Option<String>,
    features: Option<Vec<String>>,
    target: Option<String>,
    dataset: Option<Vec<JsonRow>>,
}

/// Archive the registered supervised model together with the caller-provided
/// training dataset and upload it to the model bucket.
pub async fn save_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveModelRequest>,
) -> Result<Json<Value>> {
    let algo_name = require_field(req.algo_name, "algo_name")?;
    let model_name = require_string(req.model_name, "model_name")?;
    let features = require_list(req.features, "features")?;
    let target = require_string(req.target, "target")?;
    let dataset = require_list(req.dataset, "dataset")?;

    if algo_name == Algorithm::KMeans {
        return Err(ApiError::InvalidParameter(
            "use save_unsupervised for clustering models".to_string(),
        ));
    }

    let entry = state
        .registry
        .get(algo_name)
        .ok_or(ApiError::NotTrained(algo_name))?;

    let mut columns = features.clone();
    columns.push(target.clone());
    let df = tabular::records_to_df(&dataset, &columns)?;

    let metadata = ModelMetadata {
        features,
        target: Some(target),
        algo_name,
    };
    let bytes = archive::pack(&model_name, &entry.model.to_blob(), &metadata, &df, None)?;

    let blob_name = format!("{model_name}{ARCHIVE_EXT}");
    state.storage.models.put(&blob_name, Bytes::from(bytes)).await?;

    Ok(Json(json!({ "success": SAVE_OK })))
}

#[derive(Deserialize)]
pub struct SaveUnsupervisedRequest {
    algo_name: Option<Algorithm>,
    model_name: Option<String>,
    features: Option<Vec<String>>,
    dataset: Option<Vec<JsonRow>>,
}

/// Archive the registered clustering model, embedding both the original and
/// the cluster-augmented datasets.
pub async fn save_unsupervised(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveUnsupervisedRequest>,
) -> Result<Json<Value>> {
    let algo_name = require_field(req.algo_name, "algo_name")?;
    let model_name = require_string(req.model_name, "model_name")?;
    let features = require_list(req.features, "features")?;
    let dataset = require_list(req.dataset, "dataset")?;

    if algo_name != Algorithm::KMeans {
        return Err(ApiError::InvalidParameter(
            "save_unsupervised only supports clustering models".to_string(),
        ));
    }

    let entry = state
        .registry
        .get(algo_name)
        .ok_or(ApiError::NotTrained(algo_name))?;
    let TrainedModel::KMeans { derived, .. } = &entry.model else {
        return Err(ApiError::Internal("registry holds a non-clustering model".to_string()));
    };

    let df = tabular::records_to_df(&dataset, &features)?;

    let metadata = ModelMetadata {
        features,
        target: None,
        algo_name,
    };
    let bytes = archive::pack(
        &model_name,
        &entry.model.to_blob(),
        &metadata,
        &df,
        Some(derived),
    )?;

    let blob_name = format!("{model_name}{ARCHIVE_EXT}");
    state.storage.models.put(&blob_name, Bytes::from(bytes)).await?;

    Ok(Json(json!({ "success": SAVE_OK })))
}

#[derive(Deserialize)]
pub struct DeleteModelRequest {
    model_name: Option<String>,
}

pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteModelRequest>,
) -> Result<Json<Value>> {
    let model_name = require_string(req.model_name, "model_name")?;

    if !state.storage.models.exists(&model_name).await? {
        return Err(ApiError::NotFound("Model not found".to_string()));
    }
    state.storage.models.delete(&model_name).await?;
    Ok(Json(json!({ "success": "Model deleted successfully" })))
}

pub async fn fetch_model_names(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.storage.models.list_names().await?))
}

#[derive(Deserialize)]
pub struct LoadModelRequest {
    model_name: Option<String>,
}

/// Download an archive, restore the registry entry for its algorithm, and
/// return the stored metadata and dataset.
pub async fn load_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadModelRequest>,
) -> Result<Json<Value>> {
    let model_name = require_string(req.model_name, "model_name")?;

    let bytes = state.storage.models.get(&model_name).await?;

    let logical_name = model_name.strip_suffix(ARCHIVE_EXT).unwrap_or(&model_name);
    let unpacked = archive::unpack(logical_name, &bytes)?;

    let dataset = tabular::df_to_records(&unpacked.dataset)?;
    let metadata = serde_json::to_value(&unpacked.metadata).map_err(crate::error::Error::Serde)?;

    let model = TrainedModel::from_blob(unpacked.blob, unpacked.derived)?;
    state.registry.put(RegistryEntry {
        features: unpacked.metadata.features.clone(),
        model,
    });

    Ok(Json(json!({
        "metadata": metadata,
        "dataset": dataset,
    })))
}
