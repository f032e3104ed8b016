use std::path::PathBuf;

use crate::SharedStateError;

#[derive(Debug, thiserror::Error)]
pub enum TestRunnerError {
    /// Failed to normalize project root
    #[error("Failed to normalize project root with error: {0}")]
    InvalidProjectRoot(std::io::Error),
    #[error("Invalid target pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("Failed to read {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error(transparent)]
    SharedState(#[from] SharedStateError),
    #[error("Test run was interrupted")]
    Interrupted,
    #[error("Not all test cases passed")]
    NotAllPassed,
}
