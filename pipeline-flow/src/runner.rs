//! PipelineRunner – loads a session, drives its pipeline forward, and persists
//! the updated session back to storage after every stage transition.
//!
//! The runner owns the two invariants the engine guarantees:
//!
//! * **Single flight** – at most one run per session at a time. A second `run`
//!   while one is outstanding fails with [`FlowError::RunInProgress`] without
//!   touching any stage. The guard is structural (an active-run map), not a
//!   caller convention.
//! * **No stale writes** – every run owns a [`CancellationToken`] and records
//!   the session's generation at start. `cancel` aborts the in-flight stage at
//!   the next await point, and a stage that completes under a superseded
//!   generation has its result discarded instead of saved.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{FlowError, Result},
    pipeline::Pipeline,
    session::RunStatus,
    stage::StageOutcome,
    storage::SessionStorage,
};

/// Outcome of one `run` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: RunStatus,
}

#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
    active: Arc<DashMap<String, CancellationToken>>,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            pipeline,
            storage,
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Drive the session's pipeline until it pauses, completes, or fails.
    ///
    /// Completed and failed sessions are returned as-is: a failure state is
    /// terminal until the caller resets the session, never re-executed.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let token = CancellationToken::new();
        match self.active.entry(session_id.to_string()) {
            Entry::Occupied(_) => return Err(FlowError::RunInProgress),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        let result = self.drive(session_id, token).await;
        self.active.remove(session_id);
        result
    }

    /// Cancel the in-flight run for this session, if there is one.
    pub fn cancel(&self, session_id: &str) {
        if let Some(entry) = self.active.get(session_id) {
            entry.value().cancel();
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    async fn drive(&self, session_id: &str, token: CancellationToken) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        if session.is_completed() || session.is_failed() {
            return Ok(ExecutionResult {
                response: None,
                status: session.status,
            });
        }

        let generation = session.run_generation;

        loop {
            let stage_id = session.current_stage_id.clone();
            session.status = RunStatus::Running {
                stage: stage_id.clone(),
            };
            self.storage.save(session.clone()).await?;

            debug!(session = %session_id, stage = %stage_id, "executing stage");
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    // Whoever cancelled already rewrote the stored session.
                    return Err(FlowError::Cancelled);
                }
                result = self.pipeline.run_stage(&stage_id, session.context.clone()) => result,
            };

            if token.is_cancelled() || self.superseded(session_id, generation).await? {
                debug!(session = %session_id, stage = %stage_id, "discarding stale stage result");
                return Err(FlowError::Cancelled);
            }

            match outcome {
                Err(err) => {
                    let state = self.pipeline.failure_state(&stage_id).to_string();
                    warn!(session = %session_id, stage = %stage_id, error = %err, "stage failed");
                    session.status = RunStatus::Failed {
                        state,
                        message: err.to_string(),
                    };
                    session.status_message = Some(err.to_string());
                    self.storage.save(session.clone()).await?;
                    return Ok(ExecutionResult {
                        response: None,
                        status: session.status,
                    });
                }
                Ok(result) => {
                    session.status_message = result.status_message.clone();
                    match result.outcome {
                        StageOutcome::Continue => match self.pipeline.next_stage_id(&stage_id) {
                            Some(next) => session.current_stage_id = next.to_string(),
                            None => {
                                // Last stage; nothing left to continue into.
                                session.status = RunStatus::Completed;
                                self.storage.save(session.clone()).await?;
                                return Ok(ExecutionResult {
                                    response: result.response,
                                    status: session.status,
                                });
                            }
                        },
                        StageOutcome::Pause => {
                            if let Some(next) = self.pipeline.next_stage_id(&stage_id) {
                                session.current_stage_id = next.to_string();
                            }
                            session.status = RunStatus::AwaitingInput;
                            self.storage.save(session.clone()).await?;
                            return Ok(ExecutionResult {
                                response: result.response,
                                status: session.status,
                            });
                        }
                        StageOutcome::Complete => {
                            session.status = RunStatus::Completed;
                            self.storage.save(session.clone()).await?;
                            return Ok(ExecutionResult {
                                response: result.response,
                                status: session.status,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn superseded(&self, session_id: &str, generation: u64) -> Result<bool> {
        Ok(self
            .storage
            .get(session_id)
            .await?
            .map(|s| s.run_generation != generation)
            .unwrap_or(true))
    }
}
