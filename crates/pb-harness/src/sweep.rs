//! Job spec generation for hyperparameter sweeps.

use pb_types::{validation_error, JobSpec, PbResult};
use serde::{Deserialize, Serialize};

/// Arithmetic sweep: `count` values starting at `base`, spaced by `step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub count: usize,
    pub base: i64,
    pub step: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            count: 20,
            base: 8,
            step: 4,
        }
    }
}

impl SweepConfig {
    pub fn new(count: usize, base: i64, step: i64) -> Self {
        Self { count, base, step }
    }

    pub fn specs(&self) -> PbResult<Vec<JobSpec>> {
        generate(self.count, self.base, self.step)
    }
}

/// Produce `count` specs with values `base, base + step, base + 2 * step, ...`.
///
/// Pure and deterministic. Values that do not fit in an `i64` are rejected
/// instead of wrapping.
pub fn generate(count: usize, base: i64, step: i64) -> PbResult<Vec<JobSpec>> {
    (0..count)
        .map(|index| {
            i64::try_from(index)
                .ok()
                .and_then(|i| step.checked_mul(i))
                .and_then(|offset| base.checked_add(offset))
                .map(|value| JobSpec::new(index, value))
                .ok_or_else(|| {
                    validation_error!(
                        "sweep value {} overflows (base {}, step {})",
                        index,
                        base,
                        step
                    )
                })
        })
        .collect()
}
