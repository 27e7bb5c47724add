// Executor seam between the harness and the work it benchmarks

use pb_data::SharedInput;
use pb_types::{JobError, JobResult, JobSpec};

/// Turns one job spec into one result.
///
/// Implementations are invoked from many worker threads at once and must not
/// keep mutable state between calls. The result for a given (input, spec)
/// pair must not depend on which thread runs it.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, input: &SharedInput, spec: &JobSpec) -> Result<JobResult, JobError>;

    /// Human-readable executor name.
    fn name(&self) -> &str;
}

/// Adapts a plain scoring closure into a [`JobExecutor`].
pub struct FnExecutor<F> {
    name: String,
    score: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&SharedInput, &JobSpec) -> Result<f64, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, score: F) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

impl<F> JobExecutor for FnExecutor<F>
where
    F: Fn(&SharedInput, &JobSpec) -> Result<f64, String> + Send + Sync,
{
    fn execute(&self, input: &SharedInput, spec: &JobSpec) -> Result<JobResult, JobError> {
        (self.score)(input, spec)
            .map(|score| spec.resolve(score))
            .map_err(|message| spec.fail(message))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for FnExecutor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}
