use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pb_harness::{run_benchmark, BenchConfig, DatasetSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pb-bench")]
#[command(about = "Compare sequential and concurrent execution of a parameter sweep")]
#[command(version)]
struct Cli {
    /// JSON benchmark configuration; defaults are used when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of jobs in the sweep
    #[arg(short = 'n', long = "jobs")]
    jobs: Option<usize>,

    /// Parameter value of the first job
    #[arg(long = "base", allow_hyphen_values = true)]
    base: Option<i64>,

    /// Increment between consecutive jobs
    #[arg(long = "step", allow_hyphen_values = true)]
    step: Option<i64>,

    /// Worker threads (0 = available parallelism)
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Load the dataset from a CSV file instead of generating one
    #[arg(long = "csv", value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Target column of the CSV file
    #[arg(long = "target", requires = "csv")]
    target: Option<String>,

    /// Rows of the synthetic dataset
    #[arg(long = "samples", conflicts_with = "csv")]
    samples: Option<usize>,

    /// Columns of the synthetic dataset, as TOTAL or TOTAL:INFORMATIVE
    #[arg(long = "features", conflicts_with = "csv", value_name = "SPEC")]
    features: Option<String>,

    /// Standard deviation of the synthetic target noise
    #[arg(long = "noise", conflicts_with = "csv")]
    noise: Option<f64>,

    /// Seed for the synthetic dataset
    #[arg(long = "data-seed", conflicts_with = "csv")]
    data_seed: Option<u64>,

    /// Fraction of rows held out for scoring
    #[arg(long = "test-fraction")]
    test_fraction: Option<f64>,

    /// Maximum depth of each tree
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,

    /// Fraction of features considered at each split
    #[arg(long = "max-features")]
    max_features: Option<f64>,

    /// Seed for the forest
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long = "json")]
    json: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(BenchConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        config.runtime.apply_env()?;

        if let Some(workers) = self.workers {
            config.runtime.num_workers = workers;
        }
        if let Some(count) = self.jobs {
            config.sweep.count = count;
        }
        if let Some(base) = self.base {
            config.sweep.base = base;
        }
        if let Some(step) = self.step {
            config.sweep.step = step;
        }
        if let Some(path) = self.csv {
            config.dataset.source = DatasetSource::Csv {
                path,
                target: self.target,
            };
        }
        let synthetic_flags = self.samples.is_some()
            || self.features.is_some()
            || self.noise.is_some()
            || self.data_seed.is_some();
        if synthetic_flags {
            let DatasetSource::Synthetic(synthetic) = &mut config.dataset.source else {
                anyhow::bail!("synthetic dataset flags cannot be used with a CSV dataset");
            };
            if let Some(samples) = self.samples {
                synthetic.n_samples = samples;
            }
            if let Some(spec) = &self.features {
                let (total, informative) = parse_features(spec)?;
                synthetic.n_features = total;
                synthetic.n_informative = informative.unwrap_or(synthetic.n_informative.min(total));
            }
            if let Some(noise) = self.noise {
                synthetic.noise = noise;
            }
            if let Some(seed) = self.data_seed {
                synthetic.seed = seed;
            }
        }
        if let Some(fraction) = self.test_fraction {
            config.dataset.test_fraction = fraction;
        }
        if let Some(depth) = self.max_depth {
            config.forest.max_depth = depth;
        }
        if let Some(fraction) = self.max_features {
            config.forest.max_features = fraction;
        }
        if let Some(seed) = self.seed {
            config.forest.seed = seed;
        }
        Ok((config, self.json))
    }
}

/// Parse `TOTAL` or `TOTAL:INFORMATIVE`.
fn parse_features(spec: &str) -> anyhow::Result<(usize, Option<usize>)> {
    let (total, informative) = match spec.split_once(':') {
        Some((total, informative)) => (total, Some(informative)),
        None => (spec, None),
    };
    let total = total
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid feature count '{total}'"))?;
    let informative = informative
        .map(|n| {
            n.trim()
                .parse::<usize>()
                .with_context(|| format!("invalid informative count '{n}'"))
        })
        .transpose()?;
    Ok((total, informative))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let (config, json) = Cli::parse().into_config()?;
    let report = run_benchmark(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
