//! Sequential vs. concurrent benchmark driver and its report.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pb_data::SharedInput;
use pb_engine::ForestExecutor;
use pb_types::{JobResult, JobSpec, PbResult, ResultSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BenchConfig;
use crate::remote::RemoteFn;
use crate::runner::{run_concurrent, run_sequential};
use crate::runtime::{ExecutionContext, ObjectRef};
use crate::select::select_best;

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub executor: String,
    pub num_jobs: usize,
    pub num_workers: usize,
    pub sequential_seconds: f64,
    pub concurrent_seconds: f64,
    /// Sequential wall time over concurrent wall time.
    pub speedup: f64,
    /// Whether both runners produced element-wise equal result sets.
    pub results_match: bool,
    pub sequential: ResultSet,
    pub concurrent: ResultSet,
    /// `None` only for an empty sweep.
    pub best: Option<JobResult>,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark {} ({})", self.run_id, self.executor)?;
        writeln!(f, "  jobs:        {}", self.num_jobs)?;
        writeln!(f, "  workers:     {}", self.num_workers)?;
        writeln!(f, "  sequential:  {:.3}s", self.sequential_seconds)?;
        writeln!(f, "  concurrent:  {:.3}s", self.concurrent_seconds)?;
        writeln!(f, "  speed-up:    {:.2}x", self.speedup)?;
        writeln!(f, "  identical:   {}", self.results_match)?;
        for result in &self.concurrent {
            writeln!(f, "    value {:>6}  score {:.6}", result.value, result.score)?;
        }
        match &self.best {
            Some(best) => write!(f, "  best:        value {} (score {:.6})", best.value, best.score),
            None => write!(f, "  best:        n/a (no jobs)"),
        }
    }
}

/// Runs one sweep both ways on the same context and input.
pub struct Benchmark<'a> {
    ctx: &'a ExecutionContext,
    remote: &'a RemoteFn,
}

impl<'a> Benchmark<'a> {
    pub fn new(ctx: &'a ExecutionContext, remote: &'a RemoteFn) -> Self {
        Self { ctx, remote }
    }

    pub fn run(&self, input: &ObjectRef<SharedInput>, specs: &[JobSpec]) -> PbResult<BenchmarkReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run = %run_id, jobs = specs.len(), "Starting benchmark");

        let shared = self.ctx.get(input)?;

        let clock = Instant::now();
        let sequential = run_sequential(self.remote, &shared, specs)?;
        let sequential_time = clock.elapsed();

        let clock = Instant::now();
        let concurrent = run_concurrent(self.ctx, self.remote, input, specs)?;
        let concurrent_time = clock.elapsed();

        let results_match = sequential == concurrent;
        if !results_match {
            warn!(run = %run_id, "Sequential and concurrent results differ");
        }

        let best = select_best(&concurrent).ok();
        let speedup = speedup(sequential_time, concurrent_time);
        info!(
            run = %run_id,
            sequential_s = sequential_time.as_secs_f64(),
            concurrent_s = concurrent_time.as_secs_f64(),
            speedup,
            "Benchmark finished"
        );

        Ok(BenchmarkReport {
            run_id,
            started_at,
            executor: self.remote.name().to_string(),
            num_jobs: specs.len(),
            num_workers: self.ctx.num_workers(),
            sequential_seconds: sequential_time.as_secs_f64(),
            concurrent_seconds: concurrent_time.as_secs_f64(),
            speedup,
            results_match,
            sequential,
            concurrent,
            best,
        })
    }
}

fn speedup(sequential: Duration, concurrent: Duration) -> f64 {
    let concurrent = concurrent.as_secs_f64();
    if concurrent > 0.0 {
        sequential.as_secs_f64() / concurrent
    } else {
        1.0
    }
}

/// Build everything from `config` and run the forest sweep benchmark inside
/// a scoped execution context.
pub fn run_benchmark(config: &BenchConfig) -> PbResult<BenchmarkReport> {
    config.validate()?;
    let specs = config.sweep.specs()?;
    let input = config.dataset.load()?;
    let remote = RemoteFn::register(ForestExecutor::new(config.forest.clone()));

    ExecutionContext::scope(config.runtime.clone(), |ctx| {
        let input = ctx.put(input)?;
        Benchmark::new(ctx, &remote).run(&input, &specs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, DatasetSource, RuntimeConfig};
    use crate::sweep::{generate, SweepConfig};
    use pb_data::{Dataset, SyntheticConfig};
    use pb_engine::{FnExecutor, ForestConfig};
    use pb_types::{JobError, PbError};

    fn tiny_input() -> SharedInput {
        let d = Dataset::new(vec!["x".into()], "y".into(), vec![vec![0.0]], vec![0.0]).unwrap();
        SharedInput::new(d.clone(), d).unwrap()
    }

    #[test]
    fn report_selects_best_and_matches() {
        let ctx = ExecutionContext::new(RuntimeConfig::default().with_workers(2)).unwrap();
        // Error bottoms out at value 24.
        let remote = RemoteFn::register(FnExecutor::new("valley", |_: &SharedInput, spec: &JobSpec| {
            Ok(((spec.value - 24) as f64).abs() + 0.1)
        }));
        let input = ctx.put(tiny_input()).unwrap();
        let specs = generate(10, 8, 4).unwrap();

        let report = Benchmark::new(&ctx, &remote).run(&input, &specs).unwrap();
        assert!(report.results_match);
        assert_eq!(report.num_jobs, 10);
        assert_eq!(report.num_workers, 2);
        assert_eq!(report.executor, "valley");
        assert_eq!(report.best.map(|b| b.value), Some(24));
        assert_eq!(report.sequential, report.concurrent);
        assert!(report.speedup > 0.0);
    }

    #[test]
    fn empty_sweep_has_no_best() {
        let ctx = ExecutionContext::new(RuntimeConfig::default().with_workers(1)).unwrap();
        let remote = RemoteFn::register(FnExecutor::new("noop", |_: &SharedInput, _: &JobSpec| Ok(0.0)));
        let input = ctx.put(tiny_input()).unwrap();
        let report = Benchmark::new(&ctx, &remote).run(&input, &[]).unwrap();
        assert_eq!(report.num_jobs, 0);
        assert!(report.best.is_none());
        assert!(report.results_match);
        assert!(report.to_string().contains("n/a"));
    }

    #[test]
    fn failing_job_fails_the_benchmark() {
        let ctx = ExecutionContext::new(RuntimeConfig::default().with_workers(2)).unwrap();
        let remote = RemoteFn::register(FnExecutor::new("flaky", |_: &SharedInput, spec: &JobSpec| {
            if spec.index == 1 {
                Err("no memory".into())
            } else {
                Ok(1.0)
            }
        }));
        let input = ctx.put(tiny_input()).unwrap();
        let specs = generate(3, 8, 4).unwrap();
        let err = Benchmark::new(&ctx, &remote).run(&input, &specs).unwrap_err();
        assert!(matches!(err, PbError::Job(JobError::ExecutionFailed { index: 1, .. })));
    }

    #[test]
    fn end_to_end_forest_benchmark() {
        let config = BenchConfig {
            runtime: RuntimeConfig::default().with_workers(2),
            sweep: SweepConfig::new(4, 2, 2),
            dataset: DatasetConfig {
                source: DatasetSource::Synthetic(
                    SyntheticConfig::default().with_samples(160).with_features(3, 2),
                ),
                ..DatasetConfig::default()
            },
            forest: ForestConfig::default().with_max_depth(3),
        };

        let report = run_benchmark(&config).unwrap();
        assert!(report.results_match);
        assert_eq!(report.concurrent.values(), vec![2, 4, 6, 8]);
        assert_eq!(report.executor, "random_forest");
        assert!(report.best.is_some());

        let json = serde_json::to_string(&report).unwrap();
        let back: BenchmarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, report.run_id);
        assert_eq!(back.concurrent.values(), report.concurrent.values());
    }

    #[test]
    fn speedup_handles_zero_duration() {
        assert_eq!(speedup(Duration::from_secs(1), Duration::ZERO), 1.0);
        assert_eq!(speedup(Duration::from_secs(4), Duration::from_secs(2)), 2.0);
    }
}
