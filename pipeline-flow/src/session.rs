use serde::{Deserialize, Serialize};

use crate::context::Context;

/// Where a session currently stands in its pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// Parked between runs; waiting for the caller to trigger the next one.
    AwaitingInput,
    /// A run is executing the named stage right now.
    Running { stage: String },
    /// A stage failed; `state` is the stage's declared failure label.
    /// Terminal until the session is reset.
    Failed { state: String, message: String },
    Completed,
}

/// One in-flight pipeline session.
///
/// The runner is the only component that mutates sessions; stages communicate
/// exclusively through the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pipeline_id: String,
    pub current_stage_id: String,
    pub status: RunStatus,
    pub status_message: Option<String>,
    /// Bumped on every reset. A run records the generation it started under
    /// and discards its result if the session has moved on since.
    pub run_generation: u64,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new_from_stage(id: String, pipeline_id: impl Into<String>, stage_id: &str) -> Self {
        Self {
            id,
            pipeline_id: pipeline_id.into(),
            current_stage_id: stage_id.to_string(),
            status: RunStatus::AwaitingInput,
            status_message: None,
            run_generation: 0,
            context: Context::new(),
        }
    }

    /// Reset the session back to its first stage, discarding every artifact of
    /// the current run. Legal in any state.
    ///
    /// The context is replaced, not cleared: an in-flight stage still holds the
    /// old map, so anything it writes after the reset is invisible here, and
    /// the bumped generation makes the runner drop its result.
    pub fn reset(&mut self, start_stage_id: &str) {
        self.run_generation += 1;
        self.context = Context::new();
        self.current_stage_id = start_stage_id.to_string();
        self.status = RunStatus::AwaitingInput;
        self.status_message = None;
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }
}
