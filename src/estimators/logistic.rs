//! Logistic regression with binary and multinomial variants.
//!
//! The variant is selected at fit time from the number of distinct target
//! values: exactly two classes trains a single sigmoid decision row, more
//! than two trains one softmax row per class.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// L2 regularization strength
    pub alpha: f64,
    /// Sorted distinct class labels observed at fit time
    classes: Vec<f64>,
    /// Weight rows: 1 x n_features for binary, n_classes x n_features for
    /// multinomial
    weights: Option<Array2<f64>>,
    intercepts: Option<Array1<f64>>,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
            alpha: 0.01,
            classes: Vec::new(),
            weights: None,
            intercepts: None,
            is_fitted: false,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let classes = sorted_classes(y);
        match classes.len() {
            0 | 1 => {
                return Err(Error::Training(
                    "target must contain at least 2 distinct classes".to_string(),
                ))
            }
            2 => self.fit_binary(x, y, &classes),
            _ => self.fit_multinomial(x, y, &classes),
        }
        self.classes = classes;
        self.is_fitted = true;
        Ok(())
    }

    /// Binary variant: single decision row trained against the positive
    /// (higher) class.
    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>, classes: &[f64]) {
        let n = x.nrows() as f64;
        let n_features = x.ncols();
        let positive = classes[1];
        let y01: Array1<f64> = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });

        let mut w: Array1<f64> = Array1::zeros(n_features);
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let z = x.dot(&w) + b;
            let p = z.mapv(sigmoid);
            let residual = &p - &y01;

            let grad_w = x.t().dot(&residual) / n + self.alpha * &w;
            let grad_b = residual.sum() / n;

            w -= &(self.learning_rate * &grad_w);
            b -= self.learning_rate * grad_b;

            let grad_norm = grad_w.mapv(|v| v * v).sum().sqrt() + grad_b.abs();
            if grad_norm < self.tol {
                break;
            }
        }

        self.weights = Some(w.insert_axis(Axis(0)));
        self.intercepts = Some(Array1::from_vec(vec![b]));
    }

    /// Multinomial variant: one softmax row per class.
    fn fit_multinomial(&mut self, x: &Array2<f64>, y: &Array1<f64>, classes: &[f64]) {
        let n = x.nrows() as f64;
        let n_features = x.ncols();
        let k = classes.len();

        let mut onehot = Array2::zeros((x.nrows(), k));
        for (i, value) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|label| label == value) {
                onehot[[i, c]] = 1.0;
            }
        }

        let mut w: Array2<f64> = Array2::zeros((k, n_features));
        let mut b: Array1<f64> = Array1::zeros(k);

        for _ in 0..self.max_iter {
            // logits: n_samples x k, softmax per row with max subtraction
            let mut probs = x.dot(&w.t()) + &b;
            for mut row in probs.axis_iter_mut(Axis(0)) {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                row.mapv_inplace(|v| (v - max).exp());
                let sum = row.sum();
                if sum > 0.0 {
                    row.mapv_inplace(|v| v / sum);
                }
            }

            let residual = &probs - &onehot;
            let grad_w = residual.t().dot(x) / n + self.alpha * &w;
            let grad_b = residual.sum_axis(Axis(0)) / n;

            w -= &(self.learning_rate * &grad_w);
            b -= &(self.learning_rate * &grad_b);

            let grad_norm = grad_w.mapv(|v| v * v).sum().sqrt();
            if grad_norm < self.tol {
                break;
            }
        }

        self.weights = Some(w);
        self.intercepts = Some(b);
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.coefficient_rows()?;
        let intercepts = self.intercepts()?;
        if x.ncols() != weights.ncols() {
            return Err(Error::Shape {
                expected: format!("{} features", weights.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let scores = x.dot(&weights.t()) + intercepts;
        let predictions = scores
            .axis_iter(Axis(0))
            .map(|row| {
                if self.classes.len() == 2 && weights.nrows() == 1 {
                    if sigmoid(row[0]) >= 0.5 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                } else {
                    let mut best = 0;
                    for (c, score) in row.iter().enumerate() {
                        if *score > row[best] {
                            best = c;
                        }
                    }
                    self.classes[best]
                }
            })
            .collect();
        Ok(predictions)
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Weight rows: one for binary, one per class for multinomial.
    pub fn coefficient_rows(&self) -> Result<&Array2<f64>> {
        self.weights.as_ref().ok_or(Error::NotFitted)
    }

    pub fn intercepts(&self) -> Result<&Array1<f64>> {
        self.intercepts.as_ref().ok_or(Error::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_data() -> (Array2<f64>, Array1<f64>) {
        let mut x = Array2::zeros((40, 1));
        let mut y = Array1::zeros(40);
        for i in 0..40 {
            if i < 20 {
                x[[i, 0]] = i as f64 * 0.1;
                y[i] = 0.0;
            } else {
                x[[i, 0]] = 10.0 + (i - 20) as f64 * 0.1;
                y[i] = 1.0;
            }
        }
        (x, y)
    }

    #[test]
    fn test_binary_fit_shapes() {
        let (x, y) = binary_data();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes(), &[0.0, 1.0]);
        assert_eq!(model.coefficient_rows().unwrap().nrows(), 1);
        assert_eq!(model.intercepts().unwrap().len(), 1);
    }

    #[test]
    fn test_binary_separable_accuracy() {
        let (x, y) = binary_data();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count();
        assert!(correct >= 36, "only {correct}/40 correct");
    }

    #[test]
    fn test_multinomial_fit_shapes() {
        let mut x = Array2::zeros((60, 1));
        let mut y = Array1::zeros(60);
        for i in 0..60 {
            let class = i / 20;
            x[[i, 0]] = class as f64 * 10.0 + (i % 20) as f64 * 0.1;
            y[i] = class as f64;
        }

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes(), &[0.0, 1.0, 2.0]);
        assert_eq!(model.coefficient_rows().unwrap().nrows(), 3);
        assert_eq!(model.intercepts().unwrap().len(), 3);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((10, 1));
        let y = Array1::from_elem(10, 1.0);
        let mut model = LogisticRegression::new();
        assert!(model.fit(&x, &y).is_err());
    }
}
