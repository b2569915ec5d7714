//! Task execution for tiled stereo pipelines.
//!
//! A [`Cluster`] turns task bodies into [`Task`]s whose outputs are
//! [`Deferred`] values. Two backends are provided:
//!
//! - [`SequentialCluster`]: runs each task inline, at submission.
//! - [`ThreadPoolCluster`]: runs tasks on a rayon pool, in submission order.
//!
//! The cluster's [`TaskWrapper`] decides how tiles cross task boundaries:
//! in memory ([`NoneWrapper`]) or dumped to disk and reloaded on demand
//! ([`DiskWrapper`]).
//!
//! ```
//! use stereo_tiling_orchestrator::{
//!     task_fn, Cluster, DenseTile, SequentialCluster, TaskArgs, TaskValue,
//! };
//!
//! let cluster = SequentialCluster::default();
//! let fill = cluster.create_task(
//!     task_fn(|_args| {
//!         let tile = DenseTile::new(2, 2).with_band("disp", vec![1.0; 4])?;
//!         Ok(vec![TaskValue::Dense(tile)])
//!     }),
//!     1,
//! );
//! let out = fill.call1(TaskArgs::new()).unwrap();
//! let tile = cluster.wrapper().get_obj(out.wait().unwrap()).unwrap();
//! assert_eq!((2, 2), tile.as_dense().unwrap().shape());
//! ```

mod cluster;
mod config;
mod deferred;
mod dump;
mod error;
mod pool;
mod sequential;
mod value;
mod wrapper;

pub use cluster::{Cluster, FutureIter, Task};
pub use config::{ClusterConfig, ClusterMode, WrapperMode};
pub use deferred::Deferred;
pub use error::OrchestratorError;
pub use pool::ThreadPoolCluster;
pub use sequential::SequentialCluster;
pub use value::{DenseTile, SparseTile, TaskArgs, TaskValue};
pub use wrapper::{
    task_fn, DiskWrapper, DumpedHandle, HandleKind, NoneWrapper, PreparedCall, TaskFn,
    TaskWrapper, WrapperState,
};
