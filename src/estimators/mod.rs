//! Estimator library: the five supported algorithm families.
//!
//! Each estimator is a plain serde-serializable struct over ndarray inputs,
//! so trained models can be embedded in archives as-is. The request handlers
//! only touch the documented attribute surface (coefficients, importances,
//! centroids, per-stage scores); fitting internals stay private.

pub mod decision_tree;
pub mod gradient_boosting;
pub mod kmeans;
pub mod linear;
pub mod logistic;
pub mod random_forest;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::GradientBoostingRegressor;
pub use kmeans::KMeans;
pub use linear::LinearRegression;
pub use logistic::LogisticRegression;
pub use random_forest::RandomForestClassifier;
