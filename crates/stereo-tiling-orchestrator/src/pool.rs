//! Thread-pool backend on rayon.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::cluster::Executor;
use crate::deferred::{resolve, Slot};
use crate::{
    Cluster, Deferred, OrchestratorError, PreparedCall, Task, TaskArgs, TaskFn, TaskValue,
    TaskWrapper,
};

struct PoolExecutor {
    pool: ThreadPool,
}

impl Executor for PoolExecutor {
    fn submit(
        &self,
        call: PreparedCall,
        args: TaskArgs,
        nout: usize,
    ) -> Result<Vec<Deferred>, OrchestratorError> {
        let slot = Slot::pending();
        let outputs = slot.outputs(nout);
        // FIFO: a task only waits on tasks submitted before it, which have
        // already been picked up by a worker.
        self.pool.spawn_fifo(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(move || {
                let args = args.try_map_leaves(resolve)?;
                call(args)
            }))
            .unwrap_or_else(|_| Err(OrchestratorError::task("task panicked")));
            slot.complete(result);
        });
        Ok(outputs)
    }
}

/// Runs tasks on a fixed pool of worker threads.
///
/// [`Task::call`] returns immediately with pending results; deferred
/// arguments are resolved on the worker. Task failures surface when the
/// result is awaited, as [`OrchestratorError::Upstream`].
pub struct ThreadPoolCluster {
    wrapper: Arc<dyn TaskWrapper>,
    executor: Arc<PoolExecutor>,
    nb_workers: usize,
}

impl ThreadPoolCluster {
    /// `nb_workers == 0` picks rayon's default (one per logical CPU).
    pub fn new(nb_workers: usize, wrapper: Arc<dyn TaskWrapper>) -> Result<Self, OrchestratorError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(nb_workers)
            .thread_name(|i| format!("stereo-tiling-worker-{i}"))
            .build()?;
        let nb_workers = pool.current_num_threads();
        log::info!("thread pool cluster started with {nb_workers} worker(s)");
        Ok(Self {
            wrapper,
            executor: Arc::new(PoolExecutor { pool }),
            nb_workers,
        })
    }

    #[inline]
    pub fn nb_workers(&self) -> usize {
        self.nb_workers
    }
}

impl Cluster for ThreadPoolCluster {
    fn create_task(&self, body: TaskFn, nout: usize) -> Task {
        Task::new(body, nout, Arc::clone(&self.wrapper), self.executor.clone())
    }

    fn scatter(&self, data: TaskValue, _broadcast: bool) -> TaskValue {
        data
    }

    fn wrapper(&self) -> Arc<dyn TaskWrapper> {
        Arc::clone(&self.wrapper)
    }
}
