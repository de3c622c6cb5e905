//! Shared application state.

use chrono::{DateTime, Utc};

use crate::registry::ModelRegistry;
use crate::storage::ObjectStorage;

/// Process-wide state shared by all request handlers.
pub struct AppState {
    pub storage: ObjectStorage,
    pub registry: ModelRegistry,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(storage: ObjectStorage) -> Self {
        Self {
            storage,
            registry: ModelRegistry::new(),
            started_at: Utc::now(),
        }
    }
}
