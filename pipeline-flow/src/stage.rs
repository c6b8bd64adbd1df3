use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// What the pipeline should do after a stage finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StageOutcome {
    /// Advance to the next stage and keep executing in the same run.
    Continue,
    /// Advance, persist the session, and wait for an external trigger.
    Pause,
    /// The pipeline is finished.
    Complete,
}

/// Result of a single stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Message intended for the caller (e.g. rendered in an API response).
    pub response: Option<String>,
    /// Short progress description stored on the session.
    pub status_message: Option<String>,
    pub outcome: StageOutcome,
}

impl StageResult {
    pub fn advance(status_message: impl Into<String>) -> Self {
        Self {
            response: None,
            status_message: Some(status_message.into()),
            outcome: StageOutcome::Continue,
        }
    }

    pub fn pause(response: Option<String>, status_message: impl Into<String>) -> Self {
        Self {
            response,
            status_message: Some(status_message.into()),
            outcome: StageOutcome::Pause,
        }
    }

    pub fn complete(response: Option<String>, status_message: impl Into<String>) -> Self {
        Self {
            response,
            status_message: Some(status_message.into()),
            outcome: StageOutcome::Complete,
        }
    }
}

/// One step of a pipeline. Stages are pure request/response units: all shared
/// state flows through the [`Context`], and only the runner mutates sessions.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique identifier for this stage within its pipeline.
    fn id(&self) -> &str;

    async fn run(&self, context: Context) -> Result<StageResult>;
}
