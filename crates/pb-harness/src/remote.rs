//! Submission-capable wrapper around a job executor.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use pb_data::SharedInput;
use pb_engine::JobExecutor;
use pb_types::{HarnessError, JobError, JobResult, JobSpec};
use tracing::{debug, warn};

use crate::handle::JobHandle;
use crate::runtime::{ExecutionContext, ObjectRef};

/// An executor registered once for remote submission.
///
/// Registration is independent of call sites: build one `RemoteFn`, then
/// submit any number of jobs through it, on any context.
#[derive(Clone)]
pub struct RemoteFn {
    executor: Arc<dyn JobExecutor>,
}

impl RemoteFn {
    pub fn register<E: JobExecutor + 'static>(executor: E) -> Self {
        Self::from_arc(Arc::new(executor))
    }

    pub fn from_arc(executor: Arc<dyn JobExecutor>) -> Self {
        debug!(executor = executor.name(), "Registered remote function");
        Self { executor }
    }

    pub fn name(&self) -> &str {
        self.executor.name()
    }

    /// Run the job on the calling thread. Panics are reported as failures of
    /// this job, exactly as they are for submitted jobs.
    pub fn call(&self, input: &SharedInput, spec: &JobSpec) -> Result<JobResult, JobError> {
        run_guarded(spec, || self.executor.execute(input, spec))
    }

    /// Queue the job on `ctx` and return its handle immediately.
    ///
    /// The input is resolved from the shared store once per submission and
    /// handed to the worker as a reference-counted pointer.
    pub fn submit(
        &self,
        ctx: &ExecutionContext,
        spec: JobSpec,
        input: &ObjectRef<SharedInput>,
    ) -> Result<JobHandle, HarnessError> {
        let input = ctx.get(input).map_err(|e| HarnessError::SubmissionFailed {
            index: spec.index,
            reason: e.to_string(),
        })?;
        let executor = Arc::clone(&self.executor);
        ctx.spawn(spec, move || executor.execute(&input, &spec))
    }
}

impl std::fmt::Debug for RemoteFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFn")
            .field("executor", &self.executor.name())
            .finish()
    }
}

/// Run `job`, turning a panic into a [`JobError::Panicked`] for `spec`.
pub(crate) fn run_guarded<F>(spec: &JobSpec, job: F) -> Result<JobResult, JobError>
where
    F: FnOnce() -> Result<JobResult, JobError>,
{
    match catch_unwind(AssertUnwindSafe(job)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(job = spec.index, value = spec.value, %message, "Job panicked");
            Err(JobError::Panicked {
                index: spec.index,
                value: spec.value,
                message,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use pb_data::Dataset;
    use pb_engine::FnExecutor;

    fn input() -> SharedInput {
        let d = Dataset::new(
            vec!["x".into()],
            "y".into(),
            vec![vec![1.0], vec![2.0]],
            vec![1.0, 2.0],
        )
        .unwrap();
        SharedInput::new(d.clone(), d).unwrap()
    }

    fn doubling() -> RemoteFn {
        RemoteFn::register(FnExecutor::new("double", |_: &SharedInput, spec: &JobSpec| {
            Ok(spec.value as f64 * 2.0)
        }))
    }

    #[test]
    fn call_runs_inline() {
        let remote = doubling();
        let result = remote.call(&input(), &JobSpec::new(0, 21)).unwrap();
        assert_eq!(result.score, 42.0);
        assert_eq!(remote.name(), "double");
    }

    #[test]
    fn call_catches_panics() {
        let remote = RemoteFn::register(FnExecutor::new("boom", |_: &SharedInput, spec: &JobSpec| {
            if spec.value == 12 {
                panic!("bad value {}", spec.value);
            }
            Ok(0.0)
        }));
        let err = remote.call(&input(), &JobSpec::new(1, 12)).unwrap_err();
        assert!(matches!(err, JobError::Panicked { index: 1, .. }));
        assert!(err.to_string().contains("bad value 12"));
    }

    #[test]
    fn submit_uses_shared_input() {
        let ctx = ExecutionContext::new(RuntimeConfig::default().with_workers(2)).unwrap();
        let object = ctx.put(input()).unwrap();
        let remote = RemoteFn::register(FnExecutor::new("rows", |input: &SharedInput, _: &JobSpec| {
            Ok(input.train.n_samples() as f64)
        }));
        let handle = remote.submit(&ctx, JobSpec::new(0, 8), &object).unwrap();
        assert_eq!(handle.wait().unwrap().score, 2.0);
    }

    #[test]
    fn submit_unknown_object_fails() {
        let owner = ExecutionContext::new(RuntimeConfig::default().with_workers(1)).unwrap();
        let other = ExecutionContext::new(RuntimeConfig::default().with_workers(1)).unwrap();
        let object = owner.put(input()).unwrap();
        let result = doubling().submit(&other, JobSpec::new(5, 28), &object);
        assert!(matches!(
            result,
            Err(HarnessError::SubmissionFailed { index: 5, .. })
        ));
    }

    #[test]
    fn panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }
}
