use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    task_fn, Deferred, OrchestratorError, PreparedCall, TaskArgs, TaskFn, TaskValue, TaskWrapper,
};

/// Runs prepared calls. One per backend.
pub(crate) trait Executor: Send + Sync {
    /// Run `call` on `args` (deferred arguments included) and return one
    /// handle per output. May block (inline execution) or not (pools).
    fn submit(
        &self,
        call: PreparedCall,
        args: TaskArgs,
        nout: usize,
    ) -> Result<Vec<Deferred>, OrchestratorError>;
}

/// Task created by [`Cluster::create_task`].
///
/// Calling it returns one [`Deferred`] per declared output. Outputs of a task
/// may be passed, still deferred, as arguments of a task submitted later.
#[derive(Clone)]
pub struct Task {
    body: TaskFn,
    nout: usize,
    wrapper: Arc<dyn TaskWrapper>,
    executor: Arc<dyn Executor>,
}

impl Task {
    pub(crate) fn new(
        body: TaskFn,
        nout: usize,
        wrapper: Arc<dyn TaskWrapper>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            body,
            nout,
            wrapper,
            executor,
        }
    }

    #[inline]
    pub fn nout(&self) -> usize {
        self.nout
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(nout = self.nout))
    )]
    pub fn call(&self, args: TaskArgs) -> Result<Vec<Deferred>, OrchestratorError> {
        let body = Arc::clone(&self.body);
        let nout = self.nout;
        let checked = task_fn(move |args| {
            let outputs = body(args)?;
            if outputs.len() != nout {
                return Err(OrchestratorError::OutputArity {
                    expected: nout,
                    got: outputs.len(),
                });
            }
            Ok(outputs)
        });
        let call = self.wrapper.prepare(checked, nout);
        self.executor.submit(call, args, nout)
    }

    /// [`Task::call`] for single-output tasks.
    pub fn call1(&self, args: TaskArgs) -> Result<Deferred, OrchestratorError> {
        let mut outputs = self.call(args)?;
        match outputs.len() {
            1 => Ok(outputs.remove(0)),
            got => Err(OrchestratorError::OutputArity { expected: 1, got }),
        }
    }
}

/// Execution backend.
///
/// Tasks must be pure functions of their arguments; results are immutable
/// once produced. One cluster, with one wrapper, serves a whole run.
pub trait Cluster: Send + Sync {
    /// Wrap `body` (returning `nout` values) as a submittable task.
    fn create_task(&self, body: TaskFn, nout: usize) -> Task;

    /// Make `data` available to every worker. Backends sharing memory with
    /// the caller return it unchanged.
    fn scatter(&self, data: TaskValue, broadcast: bool) -> TaskValue;

    fn wrapper(&self) -> Arc<dyn TaskWrapper>;

    /// Wait for every result, preserving input order.
    fn start_tasks(&self, futures: &[Deferred]) -> Result<Vec<TaskValue>, OrchestratorError> {
        futures.iter().map(Deferred::wait).collect()
    }

    /// Results in completion order, each with its position in `futures`.
    ///
    /// Single pass: results are not recomputed once consumed.
    fn future_iterator(&self, futures: Vec<Deferred>) -> FutureIter {
        FutureIter::new(futures)
    }

    /// Release the wrapper's resources.
    fn cleanup(&self) -> Result<(), OrchestratorError> {
        self.wrapper().cleanup()
    }
}

/// Iterator returned by [`Cluster::future_iterator`].
pub struct FutureIter {
    futures: Vec<Deferred>,
    completed: Receiver<usize>,
    remaining: usize,
}

impl FutureIter {
    fn new(futures: Vec<Deferred>) -> Self {
        let (tx, completed) = mpsc::channel();
        for (position, future) in futures.iter().enumerate() {
            future.notify(tx.clone(), position);
        }
        Self {
            remaining: futures.len(),
            futures,
            completed,
        }
    }
}

impl Iterator for FutureIter {
    type Item = (usize, Result<TaskValue, OrchestratorError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let position = self.completed.recv().ok()?;
        self.remaining -= 1;
        Some((position, self.futures[position].wait()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
