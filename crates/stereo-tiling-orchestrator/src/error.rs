use std::path::PathBuf;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    /// A dumped handle was used after its wrapper was cleaned up.
    #[error("handle {} used after its wrapper was cleaned up", .0.display())]
    HandleLifecycle(PathBuf),
    /// A task output that is neither a dense nor a sparse tile reached the
    /// disk wrapper.
    #[error("task output {index} is a {found} value, only dense and sparse tiles can be dumped")]
    SchemaMismatch { index: usize, found: &'static str },
    #[error("{kind} `{name}` has {got} values, expected {expected}")]
    Shape {
        kind: &'static str,
        name: String,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("task failed: {0}")]
    Task(String),
    #[error("task declared {expected} output(s) but returned {got}")]
    OutputArity { expected: usize, got: usize },
    #[error("missing task argument `{0}`")]
    MissingArgument(String),
    #[error(transparent)]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("corrupted dump {}: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },
    /// Failure of a task whose result was awaited.
    #[error("upstream task failed: {0}")]
    Upstream(#[source] Arc<OrchestratorError>),
}

impl OrchestratorError {
    /// Error for task bodies to report a domain failure.
    pub fn task(msg: impl Into<String>) -> Self {
        OrchestratorError::Task(msg.into())
    }

    /// Innermost error, looking through [`OrchestratorError::Upstream`].
    pub fn root(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::Upstream(inner) => inner.root(),
            other => other,
        }
    }
}
