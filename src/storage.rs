//! Object storage adapter: two logical buckets, one for raw datasets and one
//! for model archives.
//!
//! The service treats storage as a key-value store addressed by blob name.
//! Production uses Google Cloud Storage; tests swap in the in-memory
//! backend without touching any handler code.

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

pub const DEFAULT_DATASET_BUCKET: &str = "learning_rate_files";
pub const DEFAULT_MODEL_BUCKET: &str = "learning_rate_models";

/// Storage configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub credentials_path: String,
    pub dataset_bucket: String,
    pub model_bucket: String,
}

impl StorageConfig {
    /// The credentials path is mandatory; the process refuses to start
    /// without it.
    pub fn from_env() -> anyhow::Result<Self> {
        let credentials_path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS").map_err(|_| {
            anyhow::anyhow!(
                "GOOGLE_APPLICATION_CREDENTIALS must point at the object-store credentials file"
            )
        })?;
        Ok(Self {
            credentials_path,
            dataset_bucket: std::env::var("DATASET_BUCKET")
                .unwrap_or_else(|_| DEFAULT_DATASET_BUCKET.to_string()),
            model_bucket: std::env::var("MODEL_BUCKET")
                .unwrap_or_else(|_| DEFAULT_MODEL_BUCKET.to_string()),
        })
    }
}

/// A single logical bucket addressed by blob name.
#[derive(Clone)]
pub struct BucketStore {
    inner: Arc<dyn ObjectStore>,
}

impl BucketStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub async fn put(&self, name: &str, data: Bytes) -> Result<(), object_store::Error> {
        self.inner
            .put(&StorePath::from(name), PutPayload::from(data))
            .await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Bytes, object_store::Error> {
        self.inner.get(&StorePath::from(name)).await?.bytes().await
    }

    pub async fn delete(&self, name: &str) -> Result<(), object_store::Error> {
        self.inner.delete(&StorePath::from(name)).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, object_store::Error> {
        match self.inner.head(&StorePath::from(name)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list_names(&self) -> Result<Vec<String>, object_store::Error> {
        let objects: Vec<_> = self.inner.list(None).try_collect().await?;
        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }
}

/// The pair of buckets backing the service.
#[derive(Clone)]
pub struct ObjectStorage {
    pub datasets: BucketStore,
    pub models: BucketStore,
}

impl ObjectStorage {
    pub fn gcs(config: &StorageConfig) -> anyhow::Result<Self> {
        let datasets = GoogleCloudStorageBuilder::new()
            .with_service_account_path(&config.credentials_path)
            .with_bucket_name(&config.dataset_bucket)
            .build()?;
        let models = GoogleCloudStorageBuilder::new()
            .with_service_account_path(&config.credentials_path)
            .with_bucket_name(&config.model_bucket)
            .build()?;
        Ok(Self {
            datasets: BucketStore::new(Arc::new(datasets)),
            models: BucketStore::new(Arc::new(models)),
        })
    }

    /// In-memory backend for tests.
    pub fn in_memory() -> Self {
        Self {
            datasets: BucketStore::new(Arc::new(InMemory::new())),
            models: BucketStore::new(Arc::new(InMemory::new())),
        }
    }
}
