//! Random forest classifier: bootstrap-bagged decision trees with majority
//! voting.

use ndarray::{Array1, Array2, ArrayView1};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::decision_tree::DecisionTree;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub random_state: Option<u64>,
    classes: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            random_state: Some(42),
            classes: Vec::new(),
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
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

        self.n_features = x.ncols();
        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        self.classes = classes;

        let base_seed = self.random_state.unwrap_or(42);
        let max_depth = self.max_depth;
        let min_samples_leaf = self.min_samples_leaf;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                // Bootstrap sample with replacement
                let mut x_boot = Array2::zeros((n_samples, x.ncols()));
                let mut y_boot = Array1::zeros(n_samples);
                for i in 0..n_samples {
                    let pick = (rng.next_u64() as usize) % n_samples;
                    x_boot.row_mut(i).assign(&x.row(pick));
                    y_boot[i] = y[pick];
                }

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_leaf(min_samples_leaf);
                if let Some(depth) = max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;

        // Average per-tree importances, renormalized
        let mut importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(tree_importances) = tree.feature_importances() {
                for (total, value) in importances.iter_mut().zip(tree_importances.iter()) {
                    *total += value;
                }
            }
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

    /// Majority vote across trees.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted);
        }
        let mut votes: HashMap<u64, usize> = HashMap::new();
        for tree in &self.trees {
            let label = tree.predict_row(row)?;
            *votes.entry(label.to_bits()).or_insert(0) += 1;
        }
        votes
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(bits, _)| f64::from_bits(bits))
            .ok_or(Error::NotFitted)
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

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Result<&Array1<f64>> {
        self.feature_importances.as_ref().ok_or(Error::NotFitted)
    }
}
