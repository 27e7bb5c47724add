// Bagged regression-tree ensemble and the executor that sweeps its size

use pb_data::{Dataset, SharedInput};
use pb_types::{validation_error, JobError, JobResult, JobSpec, PbResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::executor::JobExecutor;
use crate::metrics::mean_squared_error;
use crate::tree::{RegressionTree, TreeParams};

/// Forest hyperparameters other than the number of trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Fraction of features considered at each split, in (0, 1].
    pub max_features: f64,
    /// Draw a bootstrap sample per tree; otherwise every tree sees all rows.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_split: 4,
            max_features: 0.6,
            bootstrap: true,
            seed: 0,
        }
    }
}

impl ForestConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, fraction: f64) -> Self {
        self.max_features = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> PbResult<()> {
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(validation_error!(
                "max_features must be in (0, 1], got {}",
                self.max_features
            ));
        }
        Ok(())
    }

    fn tree_params(&self, n_features: usize) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: ((self.max_features * n_features as f64).ceil() as usize).max(1),
        }
    }

    /// Per-tree RNG. Tree `i` gets the same stream no matter how many trees
    /// the forest has or which thread builds it.
    fn tree_rng(&self, tree: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(tree as u64);
        rng
    }
}

/// Mean of an ensemble of regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, n_estimators: usize, config: &ForestConfig) -> PbResult<Self> {
        config.validate()?;
        if n_estimators == 0 {
            return Err(validation_error!("n_estimators must be positive"));
        }
        if data.is_empty() {
            return Err(validation_error!("cannot fit a forest on an empty dataset"));
        }

        let params = config.tree_params(data.n_features());
        let n = data.n_samples();
        let trees = (0..n_estimators)
            .map(|t| {
                let mut rng = config.tree_rng(t);
                let rows: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(data, &rows, &params, &mut rng)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict_all(&self, data: &Dataset) -> Vec<f64> {
        (0..data.n_samples()).map(|i| self.predict(data.row(i))).collect()
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }
}

/// Trains a forest with `n_estimators = spec.value` on the training split and
/// scores it by test-set mean squared error.
#[derive(Debug, Clone, Default)]
pub struct ForestExecutor {
    config: ForestConfig,
}

impl ForestExecutor {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl JobExecutor for ForestExecutor {
    fn execute(&self, input: &SharedInput, spec: &JobSpec) -> Result<JobResult, JobError> {
        let n_estimators = usize::try_from(spec.value)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| spec.fail(format!("n_estimators must be positive, got {}", spec.value)))?;

        let forest = RandomForest::fit(&input.train, n_estimators, &self.config)
            .map_err(|e| spec.fail(e.to_string()))?;

        let predictions = forest.predict_all(&input.test);
        let mse = mean_squared_error(&predictions, &input.test.targets)
            .ok_or_else(|| spec.fail("test split is empty"))?;

        debug!(job = spec.index, n_estimators, mse, "Forest job finished");
        Ok(spec.resolve(mse))
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::mean;
    use pb_data::SyntheticConfig;

    fn input() -> SharedInput {
        SyntheticConfig::default()
            .with_samples(240)
            .with_features(4, 3)
            .generate()
            .unwrap()
            .split(0.25, 11)
            .unwrap()
    }

    fn small_config() -> ForestConfig {
        ForestConfig::default().with_max_depth(4).with_seed(5)
    }

    #[test]
    fn forest_is_deterministic() {
        let input = input();
        let a = RandomForest::fit(&input.train, 6, &small_config()).unwrap();
        let b = RandomForest::fit(&input.train, 6, &small_config()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_estimators(), 6);
    }

    #[test]
    fn larger_forest_extends_smaller_one() {
        let input = input();
        let small = RandomForest::fit(&input.train, 3, &small_config()).unwrap();
        let large = RandomForest::fit(&input.train, 5, &small_config()).unwrap();
        assert_eq!(small.trees[..], large.trees[..3]);
    }

    #[test]
    fn forest_beats_mean_predictor() {
        let input = input();
        let forest = RandomForest::fit(&input.train, 10, &small_config()).unwrap();
        let forest_mse =
            mean_squared_error(&forest.predict_all(&input.test), &input.test.targets).unwrap();

        let train_mean = mean(&input.train.targets).unwrap();
        let baseline = vec![train_mean; input.test.n_samples()];
        let baseline_mse = mean_squared_error(&baseline, &input.test.targets).unwrap();

        assert!(forest_mse < baseline_mse, "{forest_mse} >= {baseline_mse}");
    }

    #[test]
    fn rejects_invalid_config() {
        let input = input();
        let bad = ForestConfig::default().with_max_features(0.0);
        assert!(RandomForest::fit(&input.train, 2, &bad).is_err());
        assert!(RandomForest::fit(&input.train, 0, &ForestConfig::default()).is_err());
    }

    #[test]
    fn executor_scores_and_echoes() {
        let input = input();
        let exec = ForestExecutor::new(small_config());
        let spec = JobSpec::new(1, 12);
        let first = exec.execute(&input, &spec).unwrap();
        let second = exec.execute(&input, &spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.value, 12);
        assert_eq!(first.index, 1);
        assert!(first.score.is_finite() && first.score >= 0.0);
    }

    #[test]
    fn executor_rejects_non_positive_size() {
        let input = input();
        let exec = ForestExecutor::new(small_config());
        let err = exec.execute(&input, &JobSpec::new(3, 0)).unwrap_err();
        assert_eq!(err.index(), 3);
        assert!(exec.execute(&input, &JobSpec::new(4, -8)).is_err());
    }
}
