//! Tabular data plumbing: JSON row-records, DataFrames, CSV, and matrices.
//!
//! Every request carries its dataset as an ordered sequence of rows, each a
//! mapping from column name to value. This module converts between that wire
//! shape, polars DataFrames (the CSV/archive representation), and the ndarray
//! matrices the estimators consume.

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::io::Cursor;

use crate::error::{Error, Result};

/// A single request row: column name -> scalar value.
pub type JsonRow = serde_json::Map<String, JsonValue>;

fn numeric(value: &JsonValue, column: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::Data(format!("column '{column}' contains a non-numeric value"))
    })
}

/// Build a DataFrame from JSON row-records, taking exactly `columns` in order.
pub fn records_to_df(rows: &[JsonRow], columns: &[String]) -> Result<DataFrame> {
    if rows.is_empty() {
        return Err(Error::Data("dataset contains no rows".to_string()));
    }
    let mut out = Vec::with_capacity(columns.len());
    for name in columns {
        let mut values = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let value = row.get(name).ok_or_else(|| {
                Error::Data(format!("row {i} is missing column '{name}'"))
            })?;
            values.push(numeric(value, name)?);
        }
        out.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(out)?)
}

/// Convert a DataFrame to JSON row-records (records orientation).
pub fn df_to_records(df: &DataFrame) -> Result<Vec<JsonValue>> {
    let columns = df.get_columns();
    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut record = serde_json::Map::with_capacity(columns.len());
        for col in columns {
            record.insert(col.name().to_string(), anyvalue_to_json(col.get(i)?));
        }
        records.push(JsonValue::Object(record));
    }
    Ok(records)
}

fn anyvalue_to_json(value: AnyValue) -> JsonValue {
    match value {
        AnyValue::Float64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::Boolean(v) => json!(v),
        AnyValue::String(v) => json!(v),
        AnyValue::StringOwned(v) => json!(v.as_str()),
        AnyValue::Null => JsonValue::Null,
        other => json!(format!("{other}")),
    }
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|_| Error::Data(format!("column '{name}' not found")))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let ca = series.f64()?;
    let mut out = Vec::with_capacity(ca.len());
    for value in ca.into_iter() {
        out.push(value.ok_or_else(|| {
            Error::Data(format!("column '{name}' contains null values"))
        })?);
    }
    Ok(out)
}

/// Extract the feature columns as an `n_samples x n_features` matrix.
pub fn feature_matrix(df: &DataFrame, features: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((df.height(), features.len()));
    for (j, name) in features.iter().enumerate() {
        for (i, v) in column_f64(df, name)?.into_iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }
    Ok(matrix)
}

/// Extract a single column as a target vector.
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    Ok(Array1::from_vec(column_f64(df, target)?))
}

/// Build a `1 x n_features` matrix from a single request row, in feature order.
pub fn row_to_matrix(row: &JsonRow, features: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((1, features.len()));
    for (j, name) in features.iter().enumerate() {
        let value = row
            .get(name)
            .ok_or_else(|| Error::Data(format!("feature '{name}' not provided")))?;
        matrix[[0, j]] = numeric(value, name)?;
    }
    Ok(matrix)
}

/// Serialize a DataFrame to CSV bytes with a header row.
pub fn df_to_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut df = df.clone();
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buf)
}

/// Parse CSV bytes into a DataFrame with schema inference.
pub fn csv_bytes_to_df(bytes: &[u8]) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    Ok(df)
}

/// Parse a CSV file from disk into a DataFrame.
pub fn csv_path_to_df(path: &std::path::Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<JsonRow> {
        (0..4)
            .map(|i| {
                let mut row = JsonRow::new();
                row.insert("f1".to_string(), json!(i as f64));
                row.insert("f2".to_string(), json!(i as f64 * 2.0));
                row
            })
            .collect()
    }

    #[test]
    fn test_records_round_trip_through_csv() {
        let columns = vec!["f1".to_string(), "f2".to_string()];
        let df = records_to_df(&rows(), &columns).unwrap();
        assert_eq!(df.height(), 4);

        let csv = df_to_csv_bytes(&df).unwrap();
        let restored = csv_bytes_to_df(&csv).unwrap();
        assert_eq!(restored.height(), 4);

        let records = df_to_records(&restored).unwrap();
        assert_eq!(records[2]["f2"], json!(4.0));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let columns = vec!["f1".to_string(), "missing".to_string()];
        assert!(records_to_df(&rows(), &columns).is_err());
    }

    #[test]
    fn test_feature_matrix_shape_and_order() {
        let columns = vec!["f1".to_string(), "f2".to_string()];
        let df = records_to_df(&rows(), &columns).unwrap();
        let x = feature_matrix(&df, &columns).unwrap();
        assert_eq!(x.shape(), &[4, 2]);
        assert_eq!(x[[3, 1]], 6.0);
    }

    #[test]
    fn test_row_to_matrix_orders_by_feature_list() {
        let mut row = JsonRow::new();
        row.insert("b".to_string(), json!(2.0));
        row.insert("a".to_string(), json!(1.0));
        let features = vec!["a".to_string(), "b".to_string()];
        let x = row_to_matrix(&row, &features).unwrap();
        assert_eq!(x[[0, 0]], 1.0);
        assert_eq!(x[[0, 1]], 2.0);
    }
}
