//! Train and load endpoints, one pair per algorithm family.
//!
//! Train handlers fit a fresh estimator from the request dataset and
//! register it; load handlers re-read the currently registered estimator.
//! Both return the same introspection shape, built by the shared summary
//! functions below, keyed by the caller's feature names. The registry is
//! only written after the summary has been built, so a failed request never
//! leaves partial training state behind.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use polars::prelude::Column;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{format_label, json_label, require_field, require_list, require_string};
use super::{ApiError, AppState, Result};
use crate::estimators::{
    GradientBoostingRegressor, KMeans, LinearRegression, LogisticRegression,
    RandomForestClassifier,
};
use crate::registry::{Algorithm, RegistryEntry, TrainedModel};
use crate::tabular::{self, JsonRow};

/// Ceiling on the requested cluster count.
const MAX_CLUSTERS: i64 = 8;

const DEFAULT_FOREST_TREES: usize = 100;

#[derive(Deserialize)]
pub struct LoadRequest {
    features: Option<Vec<String>>,
}

fn feature_map(features: &[String], values: impl Iterator<Item = f64>) -> Map<String, Value> {
    features
        .iter()
        .zip(values)
        .map(|(name, value)| (name.clone(), json!(value)))
        .collect()
}

fn lin_reg_summary(model: &LinearRegression, features: &[String]) -> Result<Value> {
    let coefficients = feature_map(features, model.coefficients()?.iter().copied());
    Ok(json!({ "coefficients": coefficients }))
}

/// For the binary variant there is a single coefficient row, so the maps
/// carry one entry keyed by the first class label; the full label list is
/// still reported under `classes`.
fn log_reg_summary(model: &LogisticRegression, features: &[String]) -> Result<Value> {
    let rows = model.coefficient_rows()?;
    let intercept_values = model.intercepts()?;
    let classes = model.classes();

    let mut coefficients = Map::new();
    let mut intercepts = Map::new();
    for ((class, row), intercept) in classes
        .iter()
        .zip(rows.outer_iter())
        .zip(intercept_values.iter())
    {
        let key = format_label(*class);
        coefficients.insert(
            key.clone(),
            Value::Object(feature_map(features, row.iter().copied())),
        );
        intercepts.insert(key, json!(intercept));
    }

    let class_list: Vec<Value> = classes.iter().map(|&c| json_label(c)).collect();
    Ok(json!({
        "intercepts": intercepts,
        "coefficients": coefficients,
        "classes": class_list,
    }))
}

fn forest_summary(model: &RandomForestClassifier, features: &[String]) -> Result<Value> {
    let feature_importance = feature_map(features, model.feature_importances()?.iter().copied());
    let classes: Vec<Value> = model.classes().iter().map(|&c| json_label(c)).collect();
    Ok(json!({
        "feature_importance": feature_importance,
        "estimators": model.n_trees(),
        "classes": classes,
    }))
}

fn gbr_summary(model: &GradientBoostingRegressor, features: &[String]) -> Result<Value> {
    let feature_importance = feature_map(features, model.feature_importances()?.iter().copied());
    Ok(json!({
        "feature_importance": feature_importance,
        "estimators": model.n_trees(),
        "train_scores": model.train_scores(),
        "learning_rate": model.learning_rate,
        "max_depth": model.max_depth,
    }))
}

/// Cluster statistics are recomputed from the augmented dataset, so train
/// and load report identical numbers for the same registered model.
fn kmeans_summary(
    model: &KMeans,
    derived: &polars::prelude::DataFrame,
    features: &[String],
) -> Result<Value> {
    let centroids = model.centroids()?;
    let k = model.n_clusters;

    let mut centers = Map::new();
    for i in 0..k {
        let center: Map<String, Value> = features
            .iter()
            .enumerate()
            .filter(|(j, _)| *j < centroids.ncols())
            .map(|(j, name)| (name.clone(), json!(centroids[[i, j]])))
            .collect();
        centers.insert(i.to_string(), Value::Object(center));
    }

    let x = tabular::feature_matrix(derived, features)?;
    let labels = tabular::target_vector(derived, "cluster")?;
    let mut inertias = vec![0.0f64; k];
    let mut sizes = vec![0usize; k];
    for (row, &label) in x.outer_iter().zip(labels.iter()) {
        let c = label as usize;
        if c >= k {
            continue;
        }
        sizes[c] += 1;
        inertias[c] += row
            .iter()
            .zip(centroids.row(c).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
    }

    let cluster_inertias: Map<String, Value> = inertias
        .iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), json!(v)))
        .collect();
    let cluster_sizes: Map<String, Value> = sizes
        .iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), json!(v)))
        .collect();

    Ok(json!({
        "centers": centers,
        "new_dataset": tabular::df_to_records(derived)?,
        "class_labels": (0..k).collect::<Vec<usize>>(),
        "cluster_inertias": cluster_inertias,
        "cluster_sizes": cluster_sizes,
    }))
}

/// Shared front half of every supervised train handler: validate fields and
/// build the feature matrix and target vector.
fn supervised_inputs(
    features: Option<Vec<String>>,
    target: Option<String>,
    dataset: Option<Vec<JsonRow>>,
) -> Result<(Vec<String>, ndarray::Array2<f64>, ndarray::Array1<f64>)> {
    let features = require_list(features, "features")?;
    let target = require_string(target, "target")?;
    let dataset = require_list(dataset, "dataset")?;

    let mut columns = features.clone();
    columns.push(target.clone());
    let df = tabular::records_to_df(&dataset, &columns)?;
    let x = tabular::feature_matrix(&df, &features)?;
    let y = tabular::target_vector(&df, &target)?;
    Ok((features, x, y))
}

fn registered(state: &AppState, algorithm: Algorithm) -> Result<Arc<RegistryEntry>> {
    state
        .registry
        .get(algorithm)
        .ok_or(ApiError::NotTrained(algorithm))
}

#[derive(Deserialize)]
pub struct TrainSupervisedRequest {
    features: Option<Vec<String>>,
    target: Option<String>,
    dataset: Option<Vec<JsonRow>>,
}

pub async fn train_lin_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainSupervisedRequest>,
) -> Result<Json<Value>> {
    let (features, x, y) = supervised_inputs(req.features, req.target, req.dataset)?;

    let mut model = LinearRegression::new();
    model.fit(&x, &y)?;
    let summary = lin_reg_summary(&model, &features)?;

    state.registry.put(RegistryEntry {
        features,
        model: TrainedModel::LinReg(model),
    });
    Ok(Json(summary))
}

pub async fn load_lin_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let entry = registered(&state, Algorithm::LinReg)?;
    let TrainedModel::LinReg(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    Ok(Json(lin_reg_summary(model, &features)?))
}

pub async fn train_log_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainSupervisedRequest>,
) -> Result<Json<Value>> {
    let (features, x, y) = supervised_inputs(req.features, req.target, req.dataset)?;

    let mut distinct: Vec<f64> = y.iter().copied().collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(ApiError::InvalidParameter(
            "target must contain at least 2 distinct classes".to_string(),
        ));
    }

    let mut model = LogisticRegression::new();
    model.fit(&x, &y)?;
    let summary = log_reg_summary(&model, &features)?;

    state.registry.put(RegistryEntry {
        features,
        model: TrainedModel::LogReg(model),
    });
    Ok(Json(summary))
}

pub async fn load_log_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let entry = registered(&state, Algorithm::LogReg)?;
    let TrainedModel::LogReg(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    Ok(Json(log_reg_summary(model, &features)?))
}

#[derive(Deserialize)]
pub struct TrainForestRequest {
    features: Option<Vec<String>>,
    target: Option<String>,
    dataset: Option<Vec<JsonRow>>,
    n_trees: Option<usize>,
}

pub async fn train_random_forest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainForestRequest>,
) -> Result<Json<Value>> {
    let (features, x, y) = supervised_inputs(req.features, req.target, req.dataset)?;
    let n_trees = req.n_trees.unwrap_or(DEFAULT_FOREST_TREES);

    let mut model = RandomForestClassifier::new(n_trees);
    model.fit(&x, &y)?;
    let summary = forest_summary(&model, &features)?;

    state.registry.put(RegistryEntry {
        features,
        model: TrainedModel::RandomForest(model),
    });
    Ok(Json(summary))
}

pub async fn load_random_forest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let entry = registered(&state, Algorithm::RandomForest)?;
    let TrainedModel::RandomForest(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    Ok(Json(forest_summary(model, &features)?))
}

#[derive(Deserialize)]
pub struct TrainGradBoostRequest {
    features: Option<Vec<String>>,
    target: Option<String>,
    dataset: Option<Vec<JsonRow>>,
    n_trees: Option<usize>,
    learning_rate: Option<f64>,
    max_depth: Option<usize>,
}

pub async fn train_grad_boost_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainGradBoostRequest>,
) -> Result<Json<Value>> {
    let n_trees = require_field(req.n_trees, "n_trees")?;
    let learning_rate = require_field(req.learning_rate, "learning_rate")?;
    let max_depth = require_field(req.max_depth, "max_depth")?;
    let (features, x, y) = supervised_inputs(req.features, req.target, req.dataset)?;

    let mut model = GradientBoostingRegressor::new(n_trees, learning_rate, max_depth);
    model.fit(&x, &y)?;
    let summary = gbr_summary(&model, &features)?;

    state.registry.put(RegistryEntry {
        features,
        model: TrainedModel::GradBoostReg(model),
    });
    Ok(Json(summary))
}

pub async fn load_grad_boost_reg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let entry = registered(&state, Algorithm::GradBoostReg)?;
    let TrainedModel::GradBoostReg(model) = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    Ok(Json(gbr_summary(model, &features)?))
}

#[derive(Deserialize)]
pub struct TrainKMeansRequest {
    features: Option<Vec<String>>,
    dataset: Option<Vec<JsonRow>>,
    n_clusters: Option<i64>,
}

pub async fn train_k_means(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainKMeansRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let dataset = require_list(req.dataset, "dataset")?;
    let n_clusters = require_field(req.n_clusters, "n_clusters")?;
    if n_clusters < 1 || n_clusters > MAX_CLUSTERS {
        return Err(ApiError::InvalidParameter(format!(
            "n_clusters must be between 1 and {MAX_CLUSTERS}"
        )));
    }

    let df = tabular::records_to_df(&dataset, &features)?;
    let x = tabular::feature_matrix(&df, &features)?;

    let mut model = KMeans::new(n_clusters as usize);
    let labels = model.fit_predict(&x)?;

    let mut derived = df;
    let label_column: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
    derived
        .with_column(Column::new("cluster".into(), label_column))
        .map_err(crate::error::Error::Polars)?;

    let summary = kmeans_summary(&model, &derived, &features)?;

    state.registry.put(RegistryEntry {
        features,
        model: TrainedModel::KMeans { model, derived },
    });
    Ok(Json(summary))
}

pub async fn load_k_means(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<Value>> {
    let features = require_list(req.features, "features")?;
    let entry = registered(&state, Algorithm::KMeans)?;
    let TrainedModel::KMeans { model, derived } = &entry.model else {
        return Err(ApiError::Internal("registry entry has the wrong model kind".to_string()));
    };
    Ok(Json(kmeans_summary(model, derived, &features)?))
}
