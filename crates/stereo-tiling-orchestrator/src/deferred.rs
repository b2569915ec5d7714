//! Deferred task results.
//!
//! All outputs of one task invocation share a [`Slot`]; a [`Deferred`] is a
//! slot plus the output index. Slots are filled exactly once.

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::{OrchestratorError, TaskValue};

enum SlotState {
    Pending { listeners: Vec<(Sender<usize>, usize)> },
    Ready(Vec<TaskValue>),
    Failed(Arc<OrchestratorError>),
}

pub(crate) struct Slot {
    state: Mutex<SlotState>,
    done: Condvar,
}

impl Slot {
    pub(crate) fn pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Pending {
                listeners: Vec::new(),
            }),
            done: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the task result and wake every waiter. Later calls are ignored.
    pub(crate) fn complete(&self, result: Result<Vec<TaskValue>, OrchestratorError>) {
        let mut state = self.lock();
        let listeners = match &mut *state {
            SlotState::Pending { listeners } => std::mem::take(listeners),
            _ => return,
        };
        *state = match result {
            Ok(values) => SlotState::Ready(values),
            Err(err) => {
                log::warn!("task failed: {err}");
                SlotState::Failed(Arc::new(err))
            }
        };
        drop(state);
        self.done.notify_all();
        for (tx, position) in listeners {
            let _ = tx.send(position);
        }
    }

    /// Handles to outputs `0..nout`.
    pub(crate) fn outputs(self: &Arc<Self>, nout: usize) -> Vec<Deferred> {
        (0..nout)
            .map(|index| Deferred {
                slot: Arc::clone(self),
                index,
            })
            .collect()
    }
}

/// Handle to one output of a submitted task.
///
/// Cloning shares the same result. Waiting never recomputes anything.
#[derive(Clone)]
pub struct Deferred {
    slot: Arc<Slot>,
    index: usize,
}

impl Deferred {
    /// Already computed value.
    pub fn ready(value: TaskValue) -> Self {
        Self::from_outputs(vec![value]).remove(0)
    }

    /// Already computed outputs of one task.
    pub fn from_outputs(values: Vec<TaskValue>) -> Vec<Self> {
        let nout = values.len();
        let slot = Slot::pending();
        slot.complete(Ok(values));
        slot.outputs(nout)
    }

    pub fn is_ready(&self) -> bool {
        !matches!(&*self.slot.lock(), SlotState::Pending { .. })
    }

    /// Block until the task finished, then return a copy of this output.
    ///
    /// A failed task yields [`OrchestratorError::Upstream`].
    pub fn wait(&self) -> Result<TaskValue, OrchestratorError> {
        let mut state = self.slot.lock();
        while matches!(&*state, SlotState::Pending { .. }) {
            state = self
                .slot
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match &*state {
            SlotState::Ready(values) => {
                values
                    .get(self.index)
                    .cloned()
                    .ok_or(OrchestratorError::OutputArity {
                        expected: self.index + 1,
                        got: values.len(),
                    })
            }
            SlotState::Failed(err) => Err(OrchestratorError::Upstream(Arc::clone(err))),
            SlotState::Pending { .. } => unreachable!("loop exits on completion"),
        }
    }

    /// Send `position` on `tx` once the task finished (immediately if it
    /// already has).
    pub(crate) fn notify(&self, tx: Sender<usize>, position: usize) {
        let mut state = self.slot.lock();
        match &mut *state {
            SlotState::Pending { listeners } => listeners.push((tx, position)),
            _ => {
                let _ = tx.send(position);
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("index", &self.index)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Replace every deferred leaf of `value` by its result, waiting as needed.
pub(crate) fn resolve(value: TaskValue) -> Result<TaskValue, OrchestratorError> {
    value.try_map_leaves(&mut |leaf| match leaf {
        TaskValue::Deferred(d) => resolve(d.wait()?),
        other => Ok(other),
    })
}
