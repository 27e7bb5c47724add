//! Pending-result handles and the blocking collection fold.

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use pb_types::{JobError, JobOutcome, JobResult, JobSpec, ResultSet};

/// Token for a submitted job, resolvable later into a result or a failure.
///
/// The worker posts exactly one message on the handle's channel. The first
/// observed outcome is cached, so `state` and `wait` can be called any number
/// of times.
#[derive(Debug)]
pub struct JobHandle {
    spec: JobSpec,
    rx: Receiver<Result<JobResult, JobError>>,
    outcome: Mutex<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(spec: JobSpec, rx: Receiver<Result<JobResult, JobError>>) -> Self {
        Self {
            spec,
            rx,
            outcome: Mutex::new(JobOutcome::Pending),
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Non-blocking peek. Reports `Pending` while another thread is blocked
    /// in [`wait`](Self::wait) on this handle.
    pub fn state(&self) -> JobOutcome {
        let Some(mut outcome) = self.outcome.try_lock() else {
            return JobOutcome::Pending;
        };
        if outcome.is_pending() {
            match self.rx.try_recv() {
                Ok(result) => *outcome = result.into(),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => *outcome = JobOutcome::Failed(self.lost()),
            }
        }
        outcome.clone()
    }

    /// Block until the job resolves.
    pub fn wait(&self) -> Result<JobResult, JobError> {
        let mut outcome = self.outcome.lock();
        if outcome.is_pending() {
            *outcome = match self.rx.recv() {
                Ok(result) => result.into(),
                Err(_) => JobOutcome::Failed(self.lost()),
            };
        }
        match &*outcome {
            JobOutcome::Resolved(result) => Ok(*result),
            JobOutcome::Failed(error) => Err(error.clone()),
            JobOutcome::Pending => Err(self.lost()),
        }
    }

    fn lost(&self) -> JobError {
        JobError::Lost {
            index: self.spec.index,
            value: self.spec.value,
        }
    }
}

/// Wait for every handle and report each outcome, in handle order.
///
/// Never short-circuits: failed jobs show up as `Failed` next to the
/// results of the jobs that succeeded.
pub fn collect_outcomes(handles: &[JobHandle]) -> Vec<JobOutcome> {
    handles.iter().map(|h| JobOutcome::from(h.wait())).collect()
}

/// Wait for every handle, then fold the outcomes into a [`ResultSet`].
///
/// All-or-nothing: if any job failed, the failure of the lowest-index job is
/// returned and no partial result set is produced.
pub fn collect(handles: &[JobHandle]) -> Result<ResultSet, JobError> {
    let outcomes = collect_outcomes(handles);
    let mut results = ResultSet::with_capacity(outcomes.len());
    for (handle, outcome) in handles.iter().zip(outcomes) {
        match outcome {
            JobOutcome::Resolved(result) => results.push(result),
            JobOutcome::Failed(error) => return Err(error),
            JobOutcome::Pending => return Err(handle.lost()),
        }
    }
    Ok(results)
}
