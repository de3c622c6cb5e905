//! Linear regression via the normal equations.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Solve the symmetric positive-definite system Ax = b with a Cholesky
/// decomposition, retrying once with a small ridge term when the matrix is
/// near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    match cholesky_solve_inner(a, b) {
        Some(x) => Some(x),
        None => {
            let n = a.nrows();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            let mut regularized = a.clone();
            for k in 0..n {
                regularized[[k, k]] += ridge.max(1e-12);
            }
            cholesky_solve_inner(&regularized, b)
        }
    }
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // Cholesky decomposition: A = L * L^T
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Ordinary least squares linear regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients, one per feature
    coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: f64,
    /// Whether to fit an intercept term
    pub fit_intercept: bool,
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            is_fitted: false,
        }
    }

    /// Fit by solving (X^T X) beta = X^T y.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(Error::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(Error::Training("empty design matrix".to_string()));
        }

        let design = if self.fit_intercept {
            let mut with_bias = Array2::ones((n_samples, n_features + 1));
            with_bias
                .slice_mut(ndarray::s![.., 1..])
                .assign(x);
            with_bias
        } else {
            x.clone()
        };

        let xtx = design.t().dot(&design);
        let xty = design.t().dot(y);
        let beta = cholesky_solve(&xtx, &xty)
            .ok_or_else(|| Error::Training("singular design matrix".to_string()))?;

        if self.fit_intercept {
            self.intercept = beta[0];
            self.coefficients = Some(beta.slice(ndarray::s![1..]).to_owned());
        } else {
            self.intercept = 0.0;
            self.coefficients = Some(beta);
        }
        self.is_fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients()?;
        if x.ncols() != coefficients.len() {
            return Err(Error::Shape {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let mut predictions = x.dot(coefficients);
        predictions += self.intercept;
        Ok(predictions)
    }

    pub fn coefficients(&self) -> Result<&Array1<f64>> {
        self.coefficients.as_ref().ok_or(Error::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_known_coefficients() {
        // y = 1 + 2*x1 + 3*x2
        let mut x = Array2::zeros((50, 2));
        let mut y = Array1::zeros(50);
        for i in 0..50 {
            let a = i as f64;
            let b = (i % 7) as f64;
            x[[i, 0]] = a;
            x[[i, 1]] = b;
            y[i] = 1.0 + 2.0 * a + 3.0 * b;
        }

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coefficients = model.coefficients().unwrap();
        assert!((coefficients[0] - 2.0).abs() < 1e-6);
        assert!((coefficients[1] - 3.0).abs() < 1e-6);
        assert!((model.intercept - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_single_row() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[5.0]]).unwrap();
        assert!((pred[0] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let model = LinearRegression::new();
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
