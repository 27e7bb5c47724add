use std::path::Path;

use csv::ReaderBuilder;
use pb_types::{DataError, PbResult};

use crate::dataset::Dataset;

/// Loads a numeric regression table from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvDatasetLoader {
    target_column: Option<String>,
    delimiter: u8,
}

impl Default for CsvDatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvDatasetLoader {
    pub fn new() -> Self {
        Self {
            target_column: None,
            delimiter: b',',
        }
    }

    /// Use the named column as target. Defaults to the last column.
    pub fn with_target(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a dataset from a CSV file using the csv crate.
    ///
    /// Rows with a non-numeric or missing value are skipped with a warning.
    pub fn load<P: AsRef<Path>>(&self, file_path: P) -> PbResult<Dataset> {
        let path = file_path.as_ref();
        tracing::info!("Loading CSV dataset from: {}", path.display());

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let headers = rdr
            .headers()
            .map_err(|e| DataError::ParseError {
                message: format!("Failed to read CSV headers: {e}"),
            })?
            .clone();

        if headers.len() < 2 {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "CSV needs at least one feature and one target column, found {}",
                    headers.len()
                ),
            }
            .into());
        }

        let target_idx = match &self.target_column {
            Some(name) => headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DataError::ColumnNotFound {
                    column: name.clone(),
                })?,
            None => headers.len() - 1,
        };

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.trim().to_string())
            .collect();
        let target_name = headers[target_idx].trim().to_string();

        let mut features = Vec::new();
        let mut targets = Vec::new();
        for (line_num, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| DataError::ParseError {
                message: format!("Failed to read CSV record: {e}"),
            })?;

            match Self::parse_record(&record, target_idx, headers.len()) {
                Ok((row, target)) => {
                    features.push(row);
                    targets.push(target);
                }
                Err(e) => {
                    tracing::warn!("Skipping invalid record at line {}: {}", line_num + 2, e);
                    continue;
                }
            }
        }

        if targets.is_empty() {
            return Err(DataError::InsufficientData {
                message: format!("no valid rows in {}", path.display()),
            }
            .into());
        }

        tracing::info!("Loaded {} rows from CSV file", targets.len());
        Dataset::new(feature_names, target_name, features, targets)
    }

    fn parse_record(
        record: &csv::StringRecord,
        target_idx: usize,
        width: usize,
    ) -> Result<(Vec<f64>, f64), DataError> {
        if record.len() != width {
            return Err(DataError::ParseError {
                message: format!("record has {} columns, expected {}", record.len(), width),
            });
        }

        let mut row = Vec::with_capacity(width - 1);
        let mut target = 0.0;
        for (i, field) in record.iter().enumerate() {
            let value: f64 = field.trim().parse().map_err(|_| DataError::ParseError {
                message: format!("invalid number '{field}' in column {i}"),
            })?;
            if i == target_idx {
                target = value;
            } else {
                row.push(value);
            }
        }
        Ok((row, target))
    }
}
