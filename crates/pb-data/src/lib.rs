//! Shared regression inputs for ParaBench sweeps.
//!
//! A [`SharedInput`] holds the train/test split every job reads. It is built
//! once, from a deterministic synthetic generator or a CSV file, and then
//! only ever read.

pub mod dataset;
pub mod loaders;
pub mod synthetic;

pub use dataset::{Dataset, SharedInput};
pub use loaders::CsvDatasetLoader;
pub use synthetic::SyntheticConfig;
