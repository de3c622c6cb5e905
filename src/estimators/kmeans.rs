//! K-Means clustering with k-means++ initialization.

use ndarray::{Array2, ArrayView1};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: Option<u64>,
    /// Fitted cluster centroids (n_clusters x n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster assignment for each training row
    labels: Option<Vec<usize>>,
    pub is_fitted: bool,
}

fn euclidean_sq(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: Some(42),
            centroids: None,
            labels: None,
            is_fitted: false,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// K-means++ initialization: pick centroids spread apart.
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut centroids = Array2::zeros((k, n_features));

        let first = (rng.next_u64() as usize) % n_samples;
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            // Distance to the nearest already-chosen centroid
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    let row = x.row(i);
                    (0..c)
                        .map(|j| euclidean_sq(&row, &centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            // Weighted selection proportional to squared distance
            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let pick = (rng.next_u64() as usize) % n_samples;
                centroids.row_mut(c).assign(&x.row(pick));
                continue;
            }

            let r = (rng.next_u64() as f64 / u64::MAX as f64) * total;
            let mut cumulative = 0.0;
            let mut chosen = 0;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn nearest_centroid(centroids: &Array2<f64>, row: &ArrayView1<f64>) -> usize {
        let mut best = 0;
        let mut best_dist = f64::MAX;
        for (c, centroid) in centroids.outer_iter().enumerate() {
            let dist = euclidean_sq(row, &centroid);
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if self.n_clusters == 0 {
            return Err(Error::Training("n_clusters must be at least 1".to_string()));
        }
        if n_samples < self.n_clusters {
            return Err(Error::Training(format!(
                "need at least {} samples for {} clusters, got {n_samples}",
                self.n_clusters, self.n_clusters
            )));
        }

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, &mut rng);
        let mut labels = vec![0usize; n_samples];

        for _ in 0..self.max_iter {
            for (i, row) in x.outer_iter().enumerate() {
                labels[i] = Self::nearest_centroid(&centroids, &row);
            }

            let mut new_centroids = Array2::zeros((self.n_clusters, n_features));
            let mut counts = vec![0usize; self.n_clusters];
            for (i, row) in x.outer_iter().enumerate() {
                let c = labels[i];
                counts[c] += 1;
                for (j, value) in row.iter().enumerate() {
                    new_centroids[[c, j]] += value;
                }
            }
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    let count = counts[c] as f64;
                    for j in 0..n_features {
                        new_centroids[[c, j]] /= count;
                    }
                } else {
                    // Empty cluster keeps its previous centroid
                    new_centroids.row_mut(c).assign(&centroids.row(c));
                }
            }

            let shift: f64 = centroids
                .outer_iter()
                .zip(new_centroids.outer_iter())
                .map(|(a, b)| euclidean_sq(&a, &b))
                .sum();
            centroids = new_centroids;
            if shift < self.tol {
                break;
            }
        }

        for (i, row) in x.outer_iter().enumerate() {
            labels[i] = Self::nearest_centroid(&centroids, &row);
        }

        self.centroids = Some(centroids);
        self.labels = Some(labels);
        self.is_fitted = true;
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Vec<usize>> {
        self.fit(x)?;
        Ok(self.labels.clone().unwrap_or_default())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids()?;
        Ok(x.outer_iter()
            .map(|row| Self::nearest_centroid(centroids, &row))
            .collect())
    }

    pub fn centroids(&self) -> Result<&Array2<f64>> {
        self.centroids.as_ref().ok_or(Error::NotFitted)
    }
}
