use pb_types::{DataError, PbResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row-major table of numeric features with one regression target per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    /// Create a dataset, checking that every row has one value per feature
    /// and one target.
    pub fn new(
        feature_names: Vec<String>,
        target_name: String,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> PbResult<Self> {
        if features.len() != targets.len() {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "{} feature rows but {} targets",
                    features.len(),
                    targets.len()
                ),
            }
            .into());
        }

        if let Some((row, values)) = features
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != feature_names.len())
        {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "row {} has {} values, expected {}",
                    row,
                    values.len(),
                    feature_names.len()
                ),
            }
            .into());
        }

        Ok(Self {
            feature_names,
            target_name,
            features,
            targets,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.targets.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.features[i]
    }

    /// Copy out the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Shuffle with a seeded RNG and hold out `test_fraction` of the rows.
    ///
    /// Both halves must end up non-empty.
    pub fn split(&self, test_fraction: f64, seed: u64) -> PbResult<SharedInput> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::InvalidFormat {
                message: format!("test fraction must be in (0, 1), got {test_fraction}"),
            }
            .into());
        }

        let n = self.n_samples();
        let n_test = (n as f64 * test_fraction).round() as usize;
        if n_test == 0 || n_test >= n {
            return Err(DataError::InsufficientData {
                message: format!(
                    "cannot split {n} rows with test fraction {test_fraction}"
                ),
            }
            .into());
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);
        SharedInput::new(self.select(train_idx), self.select(test_idx))
    }
}

/// Read-only input every job in a sweep sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedInput {
    pub train: Dataset,
    pub test: Dataset,
}

impl SharedInput {
    pub fn new(train: Dataset, test: Dataset) -> PbResult<Self> {
        if train.n_features() != test.n_features() {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "train has {} features, test has {}",
                    train.n_features(),
                    test.n_features()
                ),
            }
            .into());
        }
        if train.is_empty() || test.is_empty() {
            return Err(DataError::InsufficientData {
                message: "train and test splits must both be non-empty".to_string(),
            }
            .into());
        }
        Ok(Self { train, test })
    }

    pub fn n_features(&self) -> usize {
        self.train.n_features()
    }
}
