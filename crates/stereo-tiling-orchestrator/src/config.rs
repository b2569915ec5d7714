//! Backend selection.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Cluster, DiskWrapper, NoneWrapper, OrchestratorError, SequentialCluster, TaskWrapper,
    ThreadPoolCluster,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    #[default]
    Sequential,
    ThreadPool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperMode {
    #[default]
    None,
    Disk,
}

fn default_nb_workers() -> usize {
    2
}

/// Which backend and wrapper a run uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub mode: ClusterMode,
    /// Worker threads for `thread_pool`; 0 means one per logical CPU.
    #[serde(default = "default_nb_workers")]
    pub nb_workers: usize,
    #[serde(default)]
    pub wrapper: WrapperMode,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::default(),
            nb_workers: default_nb_workers(),
            wrapper: WrapperMode::default(),
        }
    }
}

impl ClusterConfig {
    /// Build the wrapper; the disk wrapper dumps under `<out_dir>/tmp`.
    pub fn build_wrapper(&self, out_dir: &Path) -> Result<Arc<dyn TaskWrapper>, OrchestratorError> {
        let wrapper: Arc<dyn TaskWrapper> = match self.wrapper {
            WrapperMode::None => Arc::new(NoneWrapper::new()),
            WrapperMode::Disk => Arc::new(DiskWrapper::new(out_dir)?),
        };
        Ok(wrapper)
    }

    pub fn build_cluster(&self, out_dir: &Path) -> Result<Box<dyn Cluster>, OrchestratorError> {
        let wrapper = self.build_wrapper(out_dir)?;
        let cluster: Box<dyn Cluster> = match self.mode {
            ClusterMode::Sequential => Box::new(SequentialCluster::new(wrapper)),
            ClusterMode::ThreadPool => Box::new(ThreadPoolCluster::new(self.nb_workers, wrapper)?),
        };
        Ok(cluster)
    }
}
