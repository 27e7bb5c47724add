//! Job model: specs, results, outcomes and ordered result sets.

use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::errors::JobError;

/// One unit of parallelizable work.
///
/// Identity is `index`, the position in the generated sweep. `value` is the
/// integer hyperparameter handed to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobSpec {
    pub index: usize,
    pub value: i64,
}

impl JobSpec {
    pub fn new(index: usize, value: i64) -> Self {
        Self { index, value }
    }

    /// Build a success result for this job.
    pub fn resolve(&self, score: f64) -> JobResult {
        JobResult {
            index: self.index,
            value: self.value,
            score,
        }
    }

    /// Build an execution failure attributed to this job.
    pub fn fail(&self, message: impl Into<String>) -> JobError {
        JobError::ExecutionFailed {
            index: self.index,
            value: self.value,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job#{}({})", self.index, self.value)
    }
}

/// Deterministic output of one job: the echoed parameter and its error score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub index: usize,
    pub value: i64,
    pub score: f64,
}

impl JobResult {
    pub fn new(index: usize, value: i64, score: f64) -> Self {
        Self { index, value, score }
    }
}

/// State of a submitted job as seen through its handle.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Pending,
    Resolved(JobResult),
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// `None` while the job is still pending.
    pub fn into_result(self) -> Option<Result<JobResult, JobError>> {
        match self {
            Self::Pending => None,
            Self::Resolved(result) => Some(Ok(result)),
            Self::Failed(error) => Some(Err(error)),
        }
    }
}

impl From<Result<JobResult, JobError>> for JobOutcome {
    fn from(result: Result<JobResult, JobError>) -> Self {
        match result {
            Ok(r) => Self::Resolved(r),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Results in submission order; one entry per submitted job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<JobResult>);

impl ResultSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, result: JobResult) {
        self.0.push(result);
    }

    pub fn into_inner(self) -> Vec<JobResult> {
        self.0
    }

    /// Hyperparameter values in result order.
    pub fn values(&self) -> Vec<i64> {
        self.0.iter().map(|r| r.value).collect()
    }

    /// Scores in result order.
    pub fn scores(&self) -> Vec<f64> {
        self.0.iter().map(|r| r.score).collect()
    }
}

impl Deref for ResultSet {
    type Target = [JobResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<JobResult>> for ResultSet {
    fn from(results: Vec<JobResult>) -> Self {
        Self(results)
    }
}

impl FromIterator<JobResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = JobResult>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a JobResult;
    type IntoIter = std::slice::Iter<'a, JobResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
