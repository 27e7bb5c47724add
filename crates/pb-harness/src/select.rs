//! Best-result selection.

use pb_types::{HarnessError, JobResult};

/// Minimum-score result in one pass. Ties keep the earliest result; a NaN
/// score only wins if nothing comparable precedes or follows it.
pub fn select_best(results: &[JobResult]) -> Result<JobResult, HarnessError> {
    let mut iter = results.iter();
    let mut best = *iter.next().ok_or(HarnessError::EmptyResultSet)?;
    for result in iter {
        if result.score < best.score || (best.score.is_nan() && !result.score.is_nan()) {
            best = *result;
        }
    }
    Ok(best)
}
