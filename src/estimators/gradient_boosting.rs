//! Gradient boosting regressor: mean-initialized residual boosting over
//! shallow regression trees with shrinkage.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    /// Number of boosting stages (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to each stage's contribution
    pub learning_rate: f64,
    /// Maximum depth per stage tree
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    /// Training MSE after each boosting stage
    train_scores: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_leaf: 1,
            trees: Vec::new(),
            initial_prediction: 0.0,
            train_scores: Vec::new(),
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(Error::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(Error::Training("n_estimators must be at least 1".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::Training("learning_rate must be positive".to_string()));
        }

        self.n_features = x.ncols();
        self.initial_prediction = y.mean().unwrap_or(0.0);

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut importances = vec![0.0; self.n_features];
        self.trees = Vec::with_capacity(self.n_estimators);
        self.train_scores = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals = y - &predictions;

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(self.min_samples_leaf);
            tree.fit(x, &residuals)?;

            let stage = tree.predict(x)?;
            predictions.scaled_add(self.learning_rate, &stage);

            let mse = (y - &predictions).mapv(|v| v * v).sum() / n_samples as f64;
            self.train_scores.push(mse);

            if let Some(tree_importances) = tree.feature_importances() {
                for (total, value) in importances.iter_mut().zip(tree_importances.iter()) {
                    *total += value;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for importance in &mut importances {
                *importance /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted);
        }
        let mut prediction = self.initial_prediction;
        for tree in &self.trees {
            prediction += self.learning_rate * tree.predict_row(row)?;
        }
        Ok(prediction)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut predictions = Array1::zeros(x.nrows());
        for (i, row) in x.outer_iter().enumerate() {
            predictions[i] = self.predict_row(row)?;
        }
        Ok(predictions)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree(&self, index: usize) -> Option<&DecisionTree> {
        self.trees.get(index)
    }

    pub fn train_scores(&self) -> &[f64] {
        &self.train_scores
    }

    pub fn feature_importances(&self) -> Result<&Array1<f64>> {
        self.feature_importances.as_ref().ok_or(Error::NotFitted)
    }
}
