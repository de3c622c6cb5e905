//! In-memory model registry.
//!
//! One slot per algorithm identifier, holding the most recently trained or
//! loaded estimator. Training and loading overwrite the slot; nothing evicts
//! it before process exit. Writers swap a whole `Arc<RegistryEntry>` under a
//! short write lock and readers clone the `Arc`, so a reader never observes a
//! half-replaced entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::estimators::{
    GradientBoostingRegressor, KMeans, LinearRegression, LogisticRegression,
    RandomForestClassifier,
};

/// The closed set of supported algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    LinReg,
    LogReg,
    RandomForest,
    GradBoostReg,
    KMeans,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::LinReg,
        Algorithm::LogReg,
        Algorithm::RandomForest,
        Algorithm::GradBoostReg,
        Algorithm::KMeans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::LinReg => "lin_reg",
            Algorithm::LogReg => "log_reg",
            Algorithm::RandomForest => "random_forest",
            Algorithm::GradBoostReg => "grad_boost_reg",
            Algorithm::KMeans => "k_means",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trained estimator as held by the registry. Clustering additionally
/// carries the cluster-augmented training dataset.
#[derive(Debug, Clone)]
pub enum TrainedModel {
    LinReg(LinearRegression),
    LogReg(LogisticRegression),
    RandomForest(RandomForestClassifier),
    GradBoostReg(GradientBoostingRegressor),
    KMeans { model: KMeans, derived: DataFrame },
}

impl TrainedModel {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            TrainedModel::LinReg(_) => Algorithm::LinReg,
            TrainedModel::LogReg(_) => Algorithm::LogReg,
            TrainedModel::RandomForest(_) => Algorithm::RandomForest,
            TrainedModel::GradBoostReg(_) => Algorithm::GradBoostReg,
            TrainedModel::KMeans { .. } => Algorithm::KMeans,
        }
    }

    /// Serializable snapshot of the estimator, without the derived dataset
    /// (archived separately as CSV).
    pub fn to_blob(&self) -> ModelBlob {
        match self {
            TrainedModel::LinReg(model) => ModelBlob::LinReg(model.clone()),
            TrainedModel::LogReg(model) => ModelBlob::LogReg(model.clone()),
            TrainedModel::RandomForest(model) => ModelBlob::RandomForest(model.clone()),
            TrainedModel::GradBoostReg(model) => ModelBlob::GradBoostReg(model.clone()),
            TrainedModel::KMeans { model, .. } => ModelBlob::KMeans(model.clone()),
        }
    }

    /// Rebuild a registry model from an archive blob. Clustering requires the
    /// derived dataset entry.
    pub fn from_blob(blob: ModelBlob, derived: Option<DataFrame>) -> Result<TrainedModel> {
        match blob {
            ModelBlob::LinReg(model) => Ok(TrainedModel::LinReg(model)),
            ModelBlob::LogReg(model) => Ok(TrainedModel::LogReg(model)),
            ModelBlob::RandomForest(model) => Ok(TrainedModel::RandomForest(model)),
            ModelBlob::GradBoostReg(model) => Ok(TrainedModel::GradBoostReg(model)),
            ModelBlob::KMeans(model) => {
                let derived = derived.ok_or_else(|| {
                    Error::CorruptArchive(
                        "clustering archive is missing its derived dataset".to_string(),
                    )
                })?;
                Ok(TrainedModel::KMeans { model, derived })
            }
        }
    }
}

/// Serialized form of a trained estimator, tagged with its algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "estimator", rename_all = "snake_case")]
pub enum ModelBlob {
    LinReg(LinearRegression),
    LogReg(LogisticRegression),
    RandomForest(RandomForestClassifier),
    GradBoostReg(GradientBoostingRegressor),
    KMeans(KMeans),
}

impl ModelBlob {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ModelBlob::LinReg(_) => Algorithm::LinReg,
            ModelBlob::LogReg(_) => Algorithm::LogReg,
            ModelBlob::RandomForest(_) => Algorithm::RandomForest,
            ModelBlob::GradBoostReg(_) => Algorithm::GradBoostReg,
            ModelBlob::KMeans(_) => Algorithm::KMeans,
        }
    }
}

/// A registry slot: the trained model plus the feature order it was fit
/// with, so single-row inference requests can be laid out correctly.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub features: Vec<String>,
    pub model: TrainedModel,
}

/// Process-wide mapping from algorithm identifier to its live entry.
#[derive(Default)]
pub struct ModelRegistry {
    slots: RwLock<HashMap<Algorithm, Arc<RegistryEntry>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any existing entry for the model's algorithm.
    pub fn put(&self, entry: RegistryEntry) {
        let algorithm = entry.model.algorithm();
        self.slots.write().insert(algorithm, Arc::new(entry));
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<Arc<RegistryEntry>> {
        self.slots.read().get(&algorithm).cloned()
    }
}
