//! # pb-harness
//!
//! Benchmark harness comparing sequential and concurrent execution of
//! independent sweep jobs for ParaBench.
//!
//! Pipeline: generate job specs, dispatch them (one at a time or to a worker
//! pool), collect every result in submission order, select the
//! minimum-error result. Provides:
//! - An explicit [`ExecutionContext`] with a shared object store and scoped teardown
//! - [`RemoteFn`] registration and non-blocking submission returning [`JobHandle`]s
//! - Sequential and concurrent runners with identical results and failures
//! - A [`Benchmark`] driver producing a serializable [`BenchmarkReport`]

pub mod benchmark;
pub mod config;
pub mod handle;
pub mod remote;
pub mod runner;
pub mod runtime;
pub mod select;
pub mod sweep;

pub use benchmark::{run_benchmark, Benchmark, BenchmarkReport};
pub use config::{BenchConfig, DatasetConfig, DatasetSource, RuntimeConfig, WORKERS_ENV};
pub use handle::{collect, collect_outcomes, JobHandle};
pub use remote::RemoteFn;
pub use runner::{dispatch, run_concurrent, run_sequential};
pub use runtime::{ExecutionContext, ObjectRef};
pub use select::select_best;
pub use sweep::{generate, SweepConfig};
