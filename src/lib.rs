//! Learning Rate - model training and persistence backend
//!
//! A REST backend for training, persisting, and serving classical ML models,
//! backed by cloud object storage for datasets and serialized archives.
//!
//! # Modules
//!
//! ## Core
//! - [`estimators`] - The five supported algorithm families
//! - [`registry`] - In-memory registry of trained models, one slot per algorithm
//! - [`archive`] - Zip archive codec for model persistence
//! - [`tabular`] - JSON rows / DataFrame / matrix conversions
//!
//! ## Infrastructure
//! - [`storage`] - Object storage over the dataset and model buckets
//! - [`viz`] - Decision tree rendering for the graph endpoints
//! - [`server`] - HTTP server with REST API

pub mod archive;
pub mod error;
pub mod estimators;
pub mod registry;
pub mod server;
pub mod storage;
pub mod tabular;
pub mod viz;

pub use error::{Error, Result};
