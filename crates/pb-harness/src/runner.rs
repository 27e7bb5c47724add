//! Sequential and concurrent sweep runners.
//!
//! Both runners return results in submission order and report the same
//! failure for the same job, so one can stand in for the other.

use pb_data::SharedInput;
use pb_types::{JobSpec, PbResult, ResultSet};
use tracing::{debug, info};

use crate::handle::{collect, JobHandle};
use crate::remote::RemoteFn;
use crate::runtime::{ExecutionContext, ObjectRef};

/// Run every job on the calling thread, in order.
///
/// Stops at the first failing job and returns its error.
pub fn run_sequential(remote: &RemoteFn, input: &SharedInput, specs: &[JobSpec]) -> PbResult<ResultSet> {
    info!(jobs = specs.len(), executor = remote.name(), "Running sweep sequentially");
    let mut results = ResultSet::with_capacity(specs.len());
    for spec in specs {
        let result = remote.call(input, spec)?;
        debug!(job = spec.index, value = spec.value, score = result.score, "Job finished");
        results.push(result);
    }
    Ok(results)
}

/// Submit every job without waiting. One handle per spec, in spec order.
///
/// If a submission is rejected the jobs already queued keep running; their
/// handles are dropped and the rejection is returned.
pub fn dispatch(
    ctx: &ExecutionContext,
    remote: &RemoteFn,
    input: &ObjectRef<SharedInput>,
    specs: &[JobSpec],
) -> PbResult<Vec<JobHandle>> {
    let handles = specs
        .iter()
        .map(|spec| remote.submit(ctx, *spec, input))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(jobs = handles.len(), "Dispatched sweep");
    Ok(handles)
}

/// Dispatch every job to the context's pool, then block once for all results.
pub fn run_concurrent(
    ctx: &ExecutionContext,
    remote: &RemoteFn,
    input: &ObjectRef<SharedInput>,
    specs: &[JobSpec],
) -> PbResult<ResultSet> {
    info!(
        jobs = specs.len(),
        workers = ctx.num_workers(),
        executor = remote.name(),
        "Running sweep concurrently"
    );
    let handles = dispatch(ctx, remote, input, specs)?;
    Ok(collect(&handles)?)
}
