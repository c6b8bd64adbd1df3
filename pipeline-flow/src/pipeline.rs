use std::sync::Arc;

use crate::{
    context::Context,
    error::{FlowError, Result},
    stage::{Stage, StageResult},
};

struct StageSlot {
    stage: Arc<dyn Stage>,
    /// State label the session takes when this stage fails, e.g.
    /// `"extraction_error"`. Failure states are terminal until a reset.
    failure_state: String,
}

/// An ordered, linear sequence of stages.
///
/// Unlike a general task graph there are no edges or conditions: every stage
/// has exactly one successor, and a failing stage parks the session in its
/// declared failure state instead of routing anywhere.
pub struct Pipeline {
    pub id: String,
    stages: Vec<StageSlot>,
}

impl Pipeline {
    pub fn stage(&self, stage_id: &str) -> Option<Arc<dyn Stage>> {
        self.stages
            .iter()
            .find(|s| s.stage.id() == stage_id)
            .map(|s| s.stage.clone())
    }

    /// Identifier of the first stage.
    pub fn start_stage_id(&self) -> &str {
        self.stages[0].stage.id()
    }

    pub fn next_stage_id(&self, stage_id: &str) -> Option<&str> {
        let pos = self.stages.iter().position(|s| s.stage.id() == stage_id)?;
        self.stages.get(pos + 1).map(|s| s.stage.id())
    }

    pub fn failure_state(&self, stage_id: &str) -> &str {
        self.stages
            .iter()
            .find(|s| s.stage.id() == stage_id)
            .map(|s| s.failure_state.as_str())
            .unwrap_or("error")
    }

    /// Execute exactly one stage against the given context.
    pub async fn run_stage(&self, stage_id: &str, context: Context) -> Result<StageResult> {
        let stage = self
            .stage(stage_id)
            .ok_or_else(|| FlowError::StageNotFound(stage_id.to_string()))?;
        stage.run(context).await
    }
}

/// Builder for pipelines. Stages execute in the order they are added.
pub struct PipelineBuilder {
    id: String,
    stages: Vec<StageSlot>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage together with the state label used when it fails.
    pub fn add_stage(mut self, stage: Arc<dyn Stage>, failure_state: impl Into<String>) -> Self {
        self.stages.push(StageSlot {
            stage,
            failure_state: failure_state.into(),
        });
        self
    }

    pub fn build(self) -> Pipeline {
        assert!(!self.stages.is_empty(), "pipeline must have at least one stage");
        Pipeline {
            id: self.id,
            stages: self.stages,
        }
    }
}
