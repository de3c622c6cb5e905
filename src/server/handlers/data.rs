//! Dataset store endpoints.

use std::io::Write;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{require_string, ApiError, AppState, Result};
use crate::tabular;

/// Multipart upload of a raw dataset file into the dataset bucket.
pub async fn store_data(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidParameter(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingField("file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidParameter(e.to_string()))?;

        state.storage.datasets.put(&file_name, bytes).await?;
        return Ok(Json(json!({ "message": "File uploaded successfully" })));
    }
    Err(ApiError::MissingField("file"))
}

#[derive(Deserialize)]
pub struct DeleteDataRequest {
    data_name: Option<String>,
}

pub async fn delete_data(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteDataRequest>,
) -> Result<Json<Value>> {
    let data_name = require_string(req.data_name, "data_name")?;

    if !state.storage.datasets.exists(&data_name).await? {
        return Err(ApiError::NotFound("File not found".to_string()));
    }
    state.storage.datasets.delete(&data_name).await?;
    Ok(Json(json!({ "success": "File deleted successfully" })))
}

pub async fn fetch_data_names(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.storage.datasets.list_names().await?))
}

#[derive(Deserialize)]
pub struct FetchDatasetQuery {
    file_name: Option<String>,
}

/// Download a CSV blob and return it as row-records. The blob is staged
/// through a temporary file that is removed on every exit path.
pub async fn fetch_dataset(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchDatasetQuery>,
) -> Result<Json<Vec<Value>>> {
    let file_name = require_string(query.file_name, "file_name")?;
    if !file_name.ends_with(".csv") {
        return Err(ApiError::InvalidParameter("file type not supported".to_string()));
    }

    let bytes = state.storage.datasets.get(&file_name).await?;

    let mut temp = tempfile::NamedTempFile::new().map_err(crate::error::Error::Io)?;
    temp.write_all(&bytes).map_err(crate::error::Error::Io)?;
    let df = tabular::csv_path_to_df(temp.path())?;

    Ok(Json(tabular::df_to_records(&df)?))
}
