// ParaBench job executors
// A job executor turns (shared input, job spec) into one scored result.

pub mod executor;
pub mod forest;
pub mod metrics;
pub mod tree;

pub use executor::{FnExecutor, JobExecutor};
pub use forest::{ForestConfig, ForestExecutor, RandomForest};
pub use tree::{RegressionTree, TreeParams};
