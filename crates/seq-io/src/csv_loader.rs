//! The CSV dataset loader: reads a header-driven CSV file into the engine's
//! dynamic [`Dataset`] shape, dropping empty fields so an absent key and an
//! empty string mean the same thing everywhere downstream.

use seq_core::{Dataset, DatasetLoader, EngineError, Record, Value};
use std::path::{Path, PathBuf};

pub struct CsvDatasetLoader;

impl DatasetLoader for CsvDatasetLoader {
    fn load(&self, path: &Path) -> Result<Dataset, EngineError> {
        if !path.exists() {
            return Err(EngineError::InputNotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path).map_err(|e| malformed(path, e))?;
        let headers = reader.headers().map_err(|e| malformed(path, e))?.clone();

        let mut dataset = Dataset::new();
        for result in reader.records() {
            let record = result.map_err(|e| malformed(path, e))?;
            let mut row = Record::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                if !field.is_empty() {
                    row.insert(header.to_string(), Value::String(field.to_string()));
                }
            }
            dataset.push(row);
        }
        Ok(dataset)
    }
}

fn malformed(path: &Path, source: impl std::fmt::Display) -> EngineError {
    EngineError::InputMalformed { path: PathBuf::from(path), source: source.to_string() }
}
