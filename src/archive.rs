//! Archive codec: one zip container per saved model.
//!
//! An archive bundles the serialized estimator, the training dataset as CSV,
//! the cluster-augmented dataset (clustering only), and a JSON metadata
//! entry. Entry names derive deterministically from the archive's logical
//! name, so unpacking locates them by exact name and fails cleanly when one
//! is missing. The container is built fully in memory; callers upload it in
//! a single put, so no partial archive is ever stored.

use std::io::{Cursor, Read, Write};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::registry::{Algorithm, ModelBlob};
use crate::tabular;

/// Suffix appended to the logical model name for the stored blob key.
pub const ARCHIVE_EXT: &str = ".zip";

fn model_entry(name: &str) -> String {
    format!("{name}.model-blob")
}

fn data_entry(name: &str) -> String {
    format!("{name}_data.csv")
}

fn derived_entry(name: &str) -> String {
    format!("{name}_new_data.csv")
}

fn metadata_entry(name: &str) -> String {
    format!("{name}_metadata.json")
}

/// Archive metadata: the feature list, the target column (absent for
/// clustering), and the owning algorithm identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub algo_name: Algorithm,
}

/// Everything recovered from an archive.
#[derive(Debug, Clone)]
pub struct UnpackedArchive {
    pub metadata: ModelMetadata,
    pub blob: ModelBlob,
    pub dataset: DataFrame,
    pub derived: Option<DataFrame>,
}

/// Build the deflate-compressed archive bytes for a model.
pub fn pack(
    name: &str,
    blob: &ModelBlob,
    metadata: &ModelMetadata,
    dataset: &DataFrame,
    derived: Option<&DataFrame>,
) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(model_entry(name), options)?;
    writer.write_all(&serde_json::to_vec(blob)?)?;

    writer.start_file(data_entry(name), options)?;
    writer.write_all(&tabular::df_to_csv_bytes(dataset)?)?;

    if let Some(derived) = derived {
        writer.start_file(derived_entry(name), options)?;
        writer.write_all(&tabular::df_to_csv_bytes(derived)?)?;
    }

    writer.start_file(metadata_entry(name), options)?;
    writer.write_all(&serde_json::to_vec(metadata)?)?;

    Ok(writer.finish()?.into_inner())
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, entry: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(entry)
        .map_err(|_| Error::CorruptArchive(format!("missing archive entry '{entry}'")))?;
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::CorruptArchive(format!("unreadable archive entry '{entry}': {e}")))?;
    Ok(bytes)
}

/// Unpack archive bytes downloaded under the given logical name.
///
/// Metadata is parsed first to learn the algorithm; the derived dataset
/// entry is required only for clustering archives.
pub fn unpack(name: &str, bytes: &[u8]) -> Result<UnpackedArchive> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::CorruptArchive(e.to_string()))?;

    let metadata: ModelMetadata = serde_json::from_slice(&read_entry(&mut archive, &metadata_entry(name))?)
        .map_err(|e| Error::CorruptArchive(format!("unreadable metadata: {e}")))?;

    let blob: ModelBlob = serde_json::from_slice(&read_entry(&mut archive, &model_entry(name))?)
        .map_err(|e| Error::IncompatibleModel(e.to_string()))?;
    if blob.algorithm() != metadata.algo_name {
        return Err(Error::IncompatibleModel(format!(
            "blob is {} but metadata declares {}",
            blob.algorithm(),
            metadata.algo_name
        )));
    }

    let dataset = tabular::csv_bytes_to_df(&read_entry(&mut archive, &data_entry(name))?)
        .map_err(|e| Error::CorruptArchive(format!("unreadable dataset: {e}")))?;

    let derived = if metadata.algo_name == Algorithm::KMeans {
        let bytes = read_entry(&mut archive, &derived_entry(name))?;
        Some(
            tabular::csv_bytes_to_df(&bytes)
                .map_err(|e| Error::CorruptArchive(format!("unreadable derived dataset: {e}")))?,
        )
    } else {
        None
    };

    Ok(UnpackedArchive {
        metadata,
        blob,
        dataset,
        derived,
    })
}
