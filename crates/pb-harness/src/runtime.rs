//! Execution context: worker pool, shared object store and job dispatch.
//!
//! An [`ExecutionContext`] is created explicitly, passed to whoever needs to
//! submit work, and torn down when it goes out of scope. Use
//! [`ExecutionContext::scope`] to run a closure against a fresh context with
//! guaranteed teardown on every exit path.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam_channel::bounded;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use pb_types::{HarnessError, JobError, JobResult, JobSpec, PbResult};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::handle::JobHandle;
use crate::remote::run_guarded;

type StoredObject = Arc<dyn Any + Send + Sync>;

/// Typed reference to a value placed in a context's shared store.
pub struct ObjectRef<T> {
    id: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjectRef<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectRef<T> {}

impl<T> fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.id).finish()
    }
}

/// Counting semaphore bounding the jobs submitted but not yet finished.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    freed: Condvar,
}

impl InFlight {
    fn current(&self) -> usize {
        *self.count.lock()
    }

    /// Block until fewer than `limit` jobs are in flight, then take a slot.
    fn acquire(self: &Arc<Self>, limit: usize) -> SlotGuard {
        let mut count = self.count.lock();
        if *count >= limit {
            debug!(in_flight = *count, limit, "Waiting for a free job slot");
        }
        while *count >= limit {
            self.freed.wait(&mut count);
        }
        *count += 1;
        SlotGuard(Arc::clone(self))
    }

    fn release(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        drop(count);
        self.freed.notify_one();
    }
}

/// Releases one in-flight slot when dropped, including during unwinding.
struct SlotGuard(Arc<InFlight>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

pub struct ExecutionContext {
    id: Uuid,
    config: RuntimeConfig,
    workers: usize,
    pool: RwLock<Option<ThreadPool>>,
    store: DashMap<Uuid, StoredObject>,
    in_flight: Arc<InFlight>,
}

impl ExecutionContext {
    pub fn new(config: RuntimeConfig) -> PbResult<Self> {
        config.validate()?;
        let workers = config.resolved_workers();
        let prefix = config.thread_name_prefix.clone();

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| HarnessError::PoolInitFailed {
                message: e.to_string(),
            })?;

        let id = Uuid::new_v4();
        info!(context = %id, workers, max_in_flight = config.max_in_flight, "Execution context started");

        Ok(Self {
            id,
            config,
            workers,
            pool: RwLock::new(Some(pool)),
            store: DashMap::new(),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Run `f` against a fresh context and shut the context down afterwards,
    /// whether `f` succeeds, fails or panics.
    pub fn scope<F, R>(config: RuntimeConfig, f: F) -> PbResult<R>
    where
        F: FnOnce(&ExecutionContext) -> PbResult<R>,
    {
        let ctx = Self::new(config)?;
        let result = f(&ctx);
        ctx.shutdown();
        result
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn num_workers(&self) -> usize {
        self.workers
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Jobs submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.read().is_none()
    }

    /// Place a value in the shared store. Jobs receive it by reference; it
    /// is never copied per job.
    pub fn put<T: Send + Sync + 'static>(&self, value: T) -> Result<ObjectRef<T>, HarnessError> {
        if self.is_shut_down() {
            return Err(HarnessError::ContextShutDown);
        }
        let id = Uuid::new_v4();
        self.store.insert(id, Arc::new(value));
        debug!(context = %self.id, object = %id, "Stored shared object");
        Ok(ObjectRef {
            id,
            _marker: PhantomData,
        })
    }

    pub fn get<T: Send + Sync + 'static>(&self, object: &ObjectRef<T>) -> Result<Arc<T>, HarnessError> {
        if self.is_shut_down() {
            return Err(HarnessError::ContextShutDown);
        }
        let stored = self
            .store
            .get(&object.id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| HarnessError::ObjectNotFound {
                id: object.id.to_string(),
            })?;
        stored
            .downcast::<T>()
            .map_err(|_| HarnessError::ObjectNotFound {
                id: object.id.to_string(),
            })
    }

    /// Drop the store's reference. Jobs still holding the value keep it alive.
    pub fn release<T>(&self, object: &ObjectRef<T>) -> bool {
        self.store.remove(&object.id).is_some()
    }

    /// Queue `job` on the pool and hand back its handle without waiting for
    /// the job itself.
    ///
    /// When `max_in_flight` jobs are already outstanding the call blocks until
    /// one of them finishes, so a sweep of any size is accepted.
    pub(crate) fn spawn<F>(&self, spec: JobSpec, job: F) -> Result<JobHandle, HarnessError>
    where
        F: FnOnce() -> Result<JobResult, JobError> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(self.shut_down_rejection(&spec));
        }
        let slot = self.in_flight.acquire(self.config.max_in_flight);

        let pool = self.pool.read();
        // Shutdown may have happened while waiting for the slot.
        let pool = pool.as_ref().ok_or_else(|| self.shut_down_rejection(&spec))?;

        let (tx, rx) = bounded(1);
        pool.spawn(move || {
            let outcome = run_guarded(&spec, job);
            // Free the slot before publishing so a collector never sees a
            // resolved handle that still counts as in flight.
            drop(slot);
            // The handle may have been dropped; nobody is waiting then.
            let _ = tx.send(outcome);
        });

        Ok(JobHandle::new(spec, rx))
    }

    fn shut_down_rejection(&self, spec: &JobSpec) -> HarnessError {
        HarnessError::SubmissionFailed {
            index: spec.index,
            reason: "execution context is shut down".to_string(),
        }
    }

    /// Stop accepting work and clear the shared store. Idempotent.
    ///
    /// Jobs already queued still run and resolve their handles.
    pub fn shutdown(&self) {
        let pool = self.pool.write().take();
        if pool.is_some() {
            let released = self.store.len();
            self.store.clear();
            info!(context = %self.id, released_objects = released, "Execution context shut down");
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::collect;
    use pb_types::PbError;

    fn ctx(workers: usize) -> ExecutionContext {
        ExecutionContext::new(RuntimeConfig::default().with_workers(workers)).unwrap()
    }

    #[test]
    fn put_get_shares_one_allocation() {
        let ctx = ctx(2);
        let object = ctx.put(vec![1.0_f64, 2.0, 3.0]).unwrap();
        let a = ctx.get(&object).unwrap();
        let b = ctx.get(&object).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn release_removes_object() {
        let ctx = ctx(1);
        let object = ctx.put(5_u32).unwrap();
        let held = ctx.get(&object).unwrap();
        assert!(ctx.release(&object));
        assert!(!ctx.release(&object));
        assert!(matches!(
            ctx.get(&object),
            Err(HarnessError::ObjectNotFound { .. })
        ));
        assert_eq!(*held, 5);
    }

    #[test]
    fn spawn_resolves_handle() {
        let ctx = ctx(2);
        let spec = JobSpec::new(0, 8);
        let handle = ctx.spawn(spec, move || Ok(spec.resolve(0.25))).unwrap();
        assert_eq!(handle.wait(), Ok(spec.resolve(0.25)));
        assert_eq!(ctx.in_flight(), 0);
    }

    #[test]
    fn panicking_job_is_reported() {
        let ctx = ctx(1);
        let spec = JobSpec::new(3, 20);
        let handle = ctx
            .spawn(spec, || -> Result<JobResult, JobError> { panic!("tree exploded") })
            .unwrap();
        match handle.wait() {
            Err(JobError::Panicked { index, message, .. }) => {
                assert_eq!(index, 3);
                assert!(message.contains("tree exploded"));
            }
            other => panic!("expected panic failure, got {other:?}"),
        }
        // The pool survives the panic.
        let next = JobSpec::new(4, 24);
        let handle = ctx.spawn(next, move || Ok(next.resolve(1.0))).unwrap();
        assert!(handle.wait().is_ok());
    }

    #[test]
    fn in_flight_limit_applies_backpressure() {
        let limit = 2;
        let ctx = ExecutionContext::new(
            RuntimeConfig::default()
                .with_workers(4)
                .with_max_in_flight(limit),
        )
        .unwrap();
        let running = Arc::new(Mutex::new((0_usize, 0_usize)));

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let spec = JobSpec::new(i, i as i64);
                let running = Arc::clone(&running);
                let handle = ctx
                    .spawn(spec, move || {
                        {
                            let mut r = running.lock();
                            r.0 += 1;
                            r.1 = r.1.max(r.0);
                        }
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        running.lock().0 -= 1;
                        Ok(spec.resolve(i as f64))
                    })
                    .unwrap();
                assert!(ctx.in_flight() <= limit);
                handle
            })
            .collect();

        let results = collect(&handles).unwrap();
        assert_eq!(results.len(), 12);
        assert_eq!(results.values(), (0..12).collect::<Vec<i64>>());
        assert!(running.lock().1 <= limit);
        assert_eq!(ctx.in_flight(), 0);
    }

    #[test]
    fn shutdown_rejects_work_and_clears_store() {
        let ctx = ctx(1);
        let object = ctx.put(String::from("shared")).unwrap();
        ctx.shutdown();
        ctx.shutdown();

        assert!(ctx.is_shut_down());
        assert!(matches!(ctx.get(&object), Err(HarnessError::ContextShutDown)));
        assert!(matches!(ctx.put(1_u8), Err(HarnessError::ContextShutDown)));
        let spec = JobSpec::new(0, 8);
        assert!(matches!(
            ctx.spawn(spec, move || Ok(spec.resolve(0.0))),
            Err(HarnessError::SubmissionFailed { index: 0, .. })
        ));
    }

    #[test]
    fn scope_tears_down_on_error() {
        let mut seen = None;
        let result: PbResult<()> = ExecutionContext::scope(RuntimeConfig::default().with_workers(1), |ctx| {
            seen = Some(ctx.id());
            Err(HarnessError::EmptyResultSet.into())
        });
        assert!(matches!(result, Err(PbError::Harness(HarnessError::EmptyResultSet))));
        assert!(seen.is_some());
    }

    #[test]
    fn scope_returns_value() {
        let workers = ExecutionContext::scope(RuntimeConfig::default().with_workers(3), |ctx| {
            Ok(ctx.num_workers())
        })
        .unwrap();
        assert_eq!(workers, 3);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = ExecutionContext::new(RuntimeConfig::default().with_max_in_flight(0));
        assert!(matches!(result, Err(PbError::Config(_))));
    }
}
