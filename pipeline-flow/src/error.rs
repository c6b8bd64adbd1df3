use thiserror::Error;

/// Errors surfaced by the pipeline engine itself.
///
/// Stage-level failures are wrapped in [`FlowError::StageFailed`]; the runner
/// turns them into a failure state on the session rather than propagating them
/// to the caller.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("missing or invalid context value: {0}")]
    ContextValue(String),

    #[error("a run is already in progress for this session")]
    RunInProgress,

    #[error("run was cancelled")]
    Cancelled,

    #[error("stage execution failed: {0}")]
    StageFailed(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
