//! Inline, single-threaded backend.

use std::sync::Arc;

use crate::cluster::Executor;
use crate::deferred::resolve;
use crate::{
    Cluster, Deferred, NoneWrapper, OrchestratorError, PreparedCall, Task, TaskArgs, TaskFn,
    TaskValue, TaskWrapper,
};

struct Inline;

impl Executor for Inline {
    fn submit(
        &self,
        call: PreparedCall,
        args: TaskArgs,
        _nout: usize,
    ) -> Result<Vec<Deferred>, OrchestratorError> {
        let args = args.try_map_leaves(resolve)?;
        Ok(Deferred::from_outputs(call(args)?))
    }
}

/// Runs every task on the calling thread, at submission.
///
/// Deferred results are always ready, and a failing task fails its own
/// [`Task::call`]. Serves as the deterministic reference for other backends.
pub struct SequentialCluster {
    wrapper: Arc<dyn TaskWrapper>,
    executor: Arc<Inline>,
}

impl SequentialCluster {
    pub fn new(wrapper: Arc<dyn TaskWrapper>) -> Self {
        log::info!("sequential cluster started");
        Self {
            wrapper,
            executor: Arc::new(Inline),
        }
    }
}

impl Default for SequentialCluster {
    fn default() -> Self {
        Self::new(Arc::new(NoneWrapper::new()))
    }
}

impl Cluster for SequentialCluster {
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
