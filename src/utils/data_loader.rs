//! Columnar data loading utilities

use crate::error::{BoostError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Data loader for columnar file formats
pub struct DataLoader {
    /// Rows used to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
        }
    }

    /// Set the number of rows used for CSV schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Load a CSV file with the given delimiter
    pub fn load_csv(&self, path: &Path, delimiter: u8) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| BoostError::DataError(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default()
            .with_separator(delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| BoostError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| BoostError::DataError(format!("{}: {}", path.display(), e)))?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| BoostError::DataError(e.to_string()))
    }

    /// Load a line-delimited JSON file, one object per row
    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| BoostError::DataError(format!("{}: {}", path.display(), e)))?;

        JsonReader::new(file)
            .with_json_format(JsonFormat::JsonLines)
            .finish()
            .map_err(|e| BoostError::DataError(e.to_string()))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            "csv" => self.load_csv(path, b','),
            "tsv" => self.load_csv(path, b'\t'),
            "json" | "jsonl" | "ndjson" => self.load_json(path),
            _ => Err(BoostError::DataError(format!(
                "unsupported input format '{}' for {}",
                ext,
                path.display()
            ))),
        }
    }
}

/// Save DataFrame to various formats
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| BoostError::DataError(e.to_string()))
    }

    /// Save to Parquet
    pub fn save_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
        let file = File::create(path)?;

        ParquetWriter::new(file)
            .finish(df)
            .map_err(|e| BoostError::DataError(e.to_string()))?;

        Ok(())
    }
}

/// Names of all columns, in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| BoostError::ColumnNotFound(name.to_string()))?;
    Ok(column.as_materialized_series().cast(dtype)?)
}

/// Read a column as `f64`, replacing nulls with `fill`
pub fn f64_column(df: &DataFrame, name: &str, fill: f64) -> Result<Vec<f64>> {
    let series = cast_column(df, name, &DataType::Float64)?;
    let values: Vec<f64> = series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(fill))
        .collect();
    Ok(values)
}

/// Read a column as `i32`; nulls (including failed casts) are an error
pub fn i32_column(df: &DataFrame, name: &str) -> Result<Vec<i32>> {
    let series = cast_column(df, name, &DataType::Int32)?;
    let ca = series.i32()?;
    if ca.null_count() > 0 {
        return Err(BoostError::ValidationError(format!(
            "column '{}' has {} entries that are not integers",
            name,
            ca.null_count()
        )));
    }
    Ok(ca.into_iter().flatten().collect())
}
