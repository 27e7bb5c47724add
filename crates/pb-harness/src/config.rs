//! Harness configuration: worker pool, dataset source and the full benchmark.

use std::path::{Path, PathBuf};

use pb_data::{CsvDatasetLoader, SharedInput, SyntheticConfig};
use pb_engine::ForestConfig;
use pb_types::{config_error, PbResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::sweep::SweepConfig;

/// Environment variable overriding [`RuntimeConfig::num_workers`].
pub const WORKERS_ENV: &str = "PB_WORKERS";

/// Configuration for an [`ExecutionContext`](crate::ExecutionContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads in the pool. `0` means one per available CPU.
    pub num_workers: usize,
    /// Maximum number of submitted jobs that have not finished yet. Further
    /// submissions wait for a free slot.
    pub max_in_flight: usize,
    pub thread_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            max_in_flight: 1024,
            thread_name_prefix: "pb-worker".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn with_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }

    /// Worker count with `0` resolved to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.num_workers > 0 {
            self.num_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn validate(&self) -> PbResult<()> {
        if self.max_in_flight == 0 {
            return Err(config_error!("max_in_flight must be at least 1"));
        }
        Ok(())
    }

    /// Apply `PB_WORKERS` if it is set.
    pub fn apply_env(&mut self) -> PbResult<()> {
        match std::env::var(WORKERS_ENV) {
            Ok(raw) => self.override_workers(&raw),
            Err(_) => Ok(()),
        }
    }

    fn override_workers(&mut self, raw: &str) -> PbResult<()> {
        self.num_workers = raw
            .trim()
            .parse()
            .map_err(|_| config_error!("{} must be a non-negative integer, got '{}'", WORKERS_ENV, raw))?;
        Ok(())
    }
}

/// Where the shared regression data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    Synthetic(SyntheticConfig),
    Csv {
        path: PathBuf,
        /// Target column name; the last column when absent.
        target: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub source: DatasetSource,
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::Synthetic(SyntheticConfig::default()),
            test_fraction: 0.25,
            split_seed: 0,
        }
    }
}

impl DatasetConfig {
    /// Build the train/test split every job will share.
    pub fn load(&self) -> PbResult<SharedInput> {
        let dataset = match &self.source {
            DatasetSource::Synthetic(synthetic) => synthetic.generate()?,
            DatasetSource::Csv { path, target } => {
                let mut loader = CsvDatasetLoader::new();
                if let Some(target) = target {
                    loader = loader.with_target(target.clone());
                }
                loader.load(path)?
            }
        };
        let input = dataset.split(self.test_fraction, self.split_seed)?;
        info!(
            train = input.train.n_samples(),
            test = input.test.n_samples(),
            features = input.n_features(),
            "Prepared shared input"
        );
        Ok(input)
    }
}

/// Everything one `pb-bench` run needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub runtime: RuntimeConfig,
    pub sweep: SweepConfig,
    pub dataset: DatasetConfig,
    pub forest: ForestConfig,
}

impl BenchConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PbResult<()> {
        self.runtime.validate()?;
        self.forest.validate()?;
        Ok(())
    }
}
