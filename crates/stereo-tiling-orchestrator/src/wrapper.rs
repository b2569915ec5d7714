//! Task wrappers: how tile values cross task boundaries.
//!
//! [`NoneWrapper`] passes values through in memory. [`DiskWrapper`] persists
//! every tile a task returns and hands out [`DumpedHandle`]s instead, loading
//! them back transparently when they are passed to the next task. Both keep
//! the task's argument and output arity, so they can be swapped without
//! touching the task graph.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::dump;
use crate::{OrchestratorError, TaskArgs, TaskValue};

/// Task body: arguments in, one value per declared output out.
pub type TaskFn =
    Arc<dyn Fn(TaskArgs) -> Result<Vec<TaskValue>, OrchestratorError> + Send + Sync>;

/// Box a closure as a [`TaskFn`].
pub fn task_fn<F>(body: F) -> TaskFn
where
    F: Fn(TaskArgs) -> Result<Vec<TaskValue>, OrchestratorError> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// One invocation of a task body, wrapped and ready to run on any thread.
pub type PreparedCall =
    Box<dyn FnOnce(TaskArgs) -> Result<Vec<TaskValue>, OrchestratorError> + Send>;

/// Lifecycle of a wrapper: active from construction, cleaned after
/// [`TaskWrapper::cleanup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapperState {
    Active,
    Cleaned,
}

pub trait TaskWrapper: Send + Sync {
    /// Wrap one invocation of `body`, which returns `nout` values.
    ///
    /// Called on the submitting thread; anything that must be decided in
    /// submission order (dump ids) is decided here.
    fn prepare(&self, body: TaskFn, nout: usize) -> PreparedCall;

    /// Bring a task result back into memory.
    fn get_obj(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError>;

    fn cleanup(&self) -> Result<(), OrchestratorError>;

    fn state(&self) -> WrapperState;
}

/// In-memory passthrough.
#[derive(Debug, Default)]
pub struct NoneWrapper {
    cleaned: AtomicBool,
}

impl NoneWrapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskWrapper for NoneWrapper {
    fn prepare(&self, body: TaskFn, _nout: usize) -> PreparedCall {
        Box::new(move |args: TaskArgs| body(args))
    }

    fn get_obj(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError> {
        Ok(value)
    }

    fn cleanup(&self) -> Result<(), OrchestratorError> {
        self.cleaned.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> WrapperState {
        if self.cleaned.load(Ordering::SeqCst) {
            WrapperState::Cleaned
        } else {
            WrapperState::Active
        }
    }
}

/// Kind of a dumped tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Dense,
    Sparse,
}

impl HandleKind {
    /// File-name prefix of dumps of this kind.
    pub fn marker(self) -> &'static str {
        match self {
            HandleKind::Dense => "dense",
            HandleKind::Sparse => "sparse",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A tile persisted by a [`DiskWrapper`], at `<tmp_dir>/<marker>_<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DumpedHandle {
    pub kind: HandleKind,
    pub path: PathBuf,
}

impl DumpedHandle {
    fn new(dir: &Path, kind: HandleKind, id: u64) -> Self {
        Self {
            kind,
            path: dir.join(format!("{}_{id}", kind.marker())),
        }
    }
}

impl fmt::Display for DumpedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

struct DiskStore {
    dir: PathBuf,
    next_id: AtomicU64,
    cleaned: AtomicBool,
}

impl DiskStore {
    fn check_active(&self, path: &Path) -> Result<(), OrchestratorError> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Err(OrchestratorError::HandleLifecycle(path.to_path_buf()));
        }
        Ok(())
    }

    /// Persist output `index`; `None` stays `None`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, value)))]
    fn dump(&self, index: usize, value: TaskValue, id: u64) -> Result<TaskValue, OrchestratorError> {
        let handle = match &value {
            TaskValue::None => return Ok(TaskValue::None),
            TaskValue::Dense(tile) => {
                let handle = self.handle(HandleKind::Dense, id)?;
                dump::write_dense(&handle.path, tile)?;
                handle
            }
            TaskValue::Sparse(tile) => {
                let handle = self.handle(HandleKind::Sparse, id)?;
                dump::write_sparse(&handle.path, tile)?;
                handle
            }
            other => {
                return Err(OrchestratorError::SchemaMismatch {
                    index,
                    found: other.kind_name(),
                })
            }
        };
        log::debug!("dumped output {index} to {handle}");
        Ok(TaskValue::Handle(handle))
    }

    fn handle(&self, kind: HandleKind, id: u64) -> Result<DumpedHandle, OrchestratorError> {
        let handle = DumpedHandle::new(&self.dir, kind, id);
        self.check_active(&handle.path)?;
        Ok(handle)
    }

    /// Load every handle found in `value`, lists included.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn load(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError> {
        value.try_map_leaves(&mut |leaf| match leaf {
            TaskValue::Handle(handle) => {
                self.check_active(&handle.path)?;
                dump::read(&handle.path, handle.kind)
            }
            other => Ok(other),
        })
    }
}

/// Wrapper dumping task outputs under `<out_dir>/tmp`.
///
/// Ids come from a counter owned by the wrapper and are drawn when a task is
/// submitted, so handle names follow submission order whatever the backend.
#[derive(Clone)]
pub struct DiskWrapper {
    store: Arc<DiskStore>,
}

impl DiskWrapper {
    /// Create `<out_dir>/tmp` and start accepting dumps.
    pub fn new(out_dir: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let dir = out_dir.as_ref().join("tmp");
        fs::create_dir_all(&dir)?;
        log::info!("disk wrapper dumping tiles to {}", dir.display());
        Ok(Self {
            store: Arc::new(DiskStore {
                dir,
                next_id: AtomicU64::new(0),
                cleaned: AtomicBool::new(false),
            }),
        })
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.store.dir
    }

    /// Persist a tile value under a fresh id.
    pub fn dump(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError> {
        let id = self.store.next_id.fetch_add(1, Ordering::SeqCst);
        self.store.dump(0, value, id)
    }

    /// Load the handles in `value` back into memory.
    pub fn load(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError> {
        self.store.load(value)
    }
}

impl fmt::Debug for DiskWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskWrapper")
            .field("dir", &self.store.dir)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskWrapper for DiskWrapper {
    fn prepare(&self, body: TaskFn, nout: usize) -> PreparedCall {
        let first = self.store.next_id.fetch_add(nout as u64, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        Box::new(move |args: TaskArgs| -> Result<Vec<TaskValue>, OrchestratorError> {
            let args = args.try_map_leaves(|v| store.load(v))?;
            body(args)?
                .into_iter()
                .enumerate()
                .map(|(index, value)| store.dump(index, value, first + index as u64))
                .collect()
        })
    }

    fn get_obj(&self, value: TaskValue) -> Result<TaskValue, OrchestratorError> {
        self.store.load(value)
    }

    /// Stop accepting dumps and loads, then remove the dump directory.
    ///
    /// Removal is retried on every call while the directory exists, so a
    /// failed removal is reported again instead of being forgotten.
    fn cleanup(&self) -> Result<(), OrchestratorError> {
        self.store.cleaned.store(true, Ordering::SeqCst);
        if self.store.dir.exists() {
            fs::remove_dir_all(&self.store.dir)?;
            log::info!("disk wrapper cleaned {}", self.store.dir.display());
        }
        Ok(())
    }

    fn state(&self) -> WrapperState {
        if self.store.cleaned.load(Ordering::SeqCst) {
            WrapperState::Cleaned
        } else {
            WrapperState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DenseTile, SparseTile};

    fn tile() -> TaskValue {
        DenseTile::new(1, 2)
            .with_band("im", vec![1.0, 2.0])
            .unwrap()
            .into()
    }

    #[test]
    fn handles_are_named_by_kind_and_id() {
        let out = tempfile::tempdir().unwrap();
        let w = DiskWrapper::new(out.path()).unwrap();
        assert_eq!(out.path().join("tmp"), w.tmp_dir());

        let a = w.dump(tile()).unwrap();
        let b = w.dump(SparseTile::new().into()).unwrap();
        let a = a.as_handle().unwrap();
        let b = b.as_handle().unwrap();
        assert_eq!(HandleKind::Dense, a.kind);
        assert_eq!(w.tmp_dir().join("dense_0"), a.path);
        assert_eq!(w.tmp_dir().join("sparse_1"), b.path);
    }

    #[test]
    fn prepared_call_reserves_ids_at_submission() {
        let out = tempfile::tempdir().unwrap();
        let w = DiskWrapper::new(out.path()).unwrap();
        let body = task_fn(|_args| Ok(vec![tile(), TaskValue::None, tile()]));

        let first = w.prepare(Arc::clone(&body), 3);
        let second = w.prepare(body, 3);
        // Run in reverse order: names still follow submission.
        let late = second(TaskArgs::new()).unwrap();
        let early = first(TaskArgs::new()).unwrap();

        assert_eq!(w.tmp_dir().join("dense_0"), early[0].as_handle().unwrap().path);
        assert!(early[1].is_none());
        assert_eq!(w.tmp_dir().join("dense_2"), early[2].as_handle().unwrap().path);
        assert_eq!(w.tmp_dir().join("dense_3"), late[0].as_handle().unwrap().path);
    }

    #[test]
    fn cleanup_is_idempotent_and_removes_dir() {
        let out = tempfile::tempdir().unwrap();
        let w = DiskWrapper::new(out.path()).unwrap();
        w.dump(tile()).unwrap();
        assert_eq!(WrapperState::Active, w.state());
        w.cleanup().unwrap();
        w.cleanup().unwrap();
        assert_eq!(WrapperState::Cleaned, w.state());
        assert!(!w.tmp_dir().exists());
    }

    #[test]
    fn cleanup_removes_leftovers_on_later_calls() {
        let out = tempfile::tempdir().unwrap();
        let w = DiskWrapper::new(out.path()).unwrap();
        w.cleanup().unwrap();

        fs::create_dir_all(w.tmp_dir()).unwrap();
        fs::write(w.tmp_dir().join("dense_7"), b"stale").unwrap();
        w.cleanup().unwrap();
        assert!(!w.tmp_dir().exists());
        assert_eq!(WrapperState::Cleaned, w.state());
    }

    #[test]
    fn none_wrapper_is_passthrough() {
        let w = NoneWrapper::new();
        let call = w.prepare(task_fn(|args| Ok(args.positional)), 1);
        let out = call(TaskArgs::new().arg(tile())).unwrap();
        assert!(out[0].as_dense().is_some());
        assert!(w.get_obj(TaskValue::None).unwrap().is_none());
    }
}
