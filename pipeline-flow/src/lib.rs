pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod stage;
pub mod storage;

// Re-export commonly used types
pub use context::Context;
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use runner::{ExecutionResult, PipelineRunner};
pub use session::{RunStatus, Session};
pub use stage::{Stage, StageOutcome, StageResult};
pub use storage::{InMemorySessionStorage, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct AppendStage {
        id: String,
        outcome: StageOutcome,
        runs: Arc<AtomicUsize>,
    }

    impl AppendStage {
        fn new(id: &str, outcome: StageOutcome) -> Self {
            Self {
                id: id.to_string(),
                outcome,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Stage for AppendStage {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<StageResult> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let mut trail: Vec<String> = context.get("trail").await.unwrap_or_default();
            trail.push(self.id.clone());
            context.set("trail", trail).await;

            Ok(StageResult {
                response: Some(format!("{} done", self.id)),
                status_message: Some(format!("finished {}", self.id)),
                outcome: self.outcome.clone(),
            })
        }
    }

    struct FailingStage;

    #[async_trait]
    impl Stage for FailingStage {
        fn id(&self) -> &str {
            "broken"
        }

        async fn run(&self, _context: Context) -> Result<StageResult> {
            Err(FlowError::StageFailed("upstream unavailable".to_string()))
        }
    }

    struct SlowStage {
        started: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl Stage for SlowStage {
        fn id(&self) -> &str {
            "slow"
        }

        async fn run(&self, _context: Context) -> Result<StageResult> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(StageResult::complete(None, "done"))
        }
    }

    fn runner_for(pipeline: Pipeline) -> (PipelineRunner, Arc<InMemorySessionStorage>) {
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = PipelineRunner::new(Arc::new(pipeline), storage.clone());
        (runner, storage)
    }

    #[tokio::test]
    async fn linear_pipeline_runs_to_completion() {
        let first = Arc::new(AppendStage::new("first", StageOutcome::Continue));
        let second = Arc::new(AppendStage::new("second", StageOutcome::Complete));
        let pipeline = PipelineBuilder::new("test")
            .add_stage(first.clone(), "first_error")
            .add_stage(second.clone(), "second_error")
            .build();
        let (runner, storage) = runner_for(pipeline);

        let session = Session::new_from_stage("s1".to_string(), "test", "first");
        storage.save(session).await.unwrap();

        let result = runner.run("s1").await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("second done"));

        let stored = storage.get("s1").await.unwrap().unwrap();
        let trail: Vec<String> = stored.context.get("trail").await.unwrap();
        assert_eq!(trail, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn pause_stops_the_run_and_resumes_later() {
        let first = Arc::new(AppendStage::new("first", StageOutcome::Pause));
        let second = Arc::new(AppendStage::new("second", StageOutcome::Complete));
        let pipeline = PipelineBuilder::new("test")
            .add_stage(first, "first_error")
            .add_stage(second, "second_error")
            .build();
        let (runner, storage) = runner_for(pipeline);

        let session = Session::new_from_stage("s1".to_string(), "test", "first");
        storage.save(session).await.unwrap();

        let paused = runner.run("s1").await.unwrap();
        assert_eq!(paused.status, RunStatus::AwaitingInput);

        let stored = storage.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.current_stage_id, "second");

        let finished = runner.run("s1").await.unwrap();
        assert_eq!(finished.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn failure_parks_session_in_declared_state_until_reset() {
        let pipeline = PipelineBuilder::new("test")
            .add_stage(Arc::new(FailingStage), "extraction_error")
            .build();
        let (runner, storage) = runner_for(pipeline);

        let session = Session::new_from_stage("s1".to_string(), "test", "broken");
        storage.save(session).await.unwrap();

        let result = runner.run("s1").await.unwrap();
        match &result.status {
            RunStatus::Failed { state, message } => {
                assert_eq!(state, "extraction_error");
                assert!(message.contains("upstream unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // Terminal until reset: a second run returns the same state without
        // re-executing anything.
        let again = runner.run("s1").await.unwrap();
        assert!(matches!(again.status, RunStatus::Failed { .. }));

        let mut stored = storage.get("s1").await.unwrap().unwrap();
        stored.reset("broken");
        assert_eq!(stored.status, RunStatus::AwaitingInput);
        assert_eq!(stored.run_generation, 1);
        assert!(stored.context.is_empty());
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_one_is_in_flight() {
        let started = Arc::new(tokio::sync::Notify::new());
        let pipeline = PipelineBuilder::new("test")
            .add_stage(
                Arc::new(SlowStage {
                    started: started.clone(),
                }),
                "slow_error",
            )
            .build();
        let (runner, storage) = runner_for(pipeline);

        let session = Session::new_from_stage("s1".to_string(), "test", "slow");
        storage.save(session).await.unwrap();

        let background = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run("s1").await })
        };
        started.notified().await;

        assert!(runner.is_running("s1"));
        let second = runner.run("s1").await;
        assert!(matches!(second, Err(FlowError::RunInProgress)));

        runner.cancel("s1");
        let first = background.await.unwrap();
        assert!(matches!(first, Err(FlowError::Cancelled)));
        assert!(!runner.is_running("s1"));
    }

    #[tokio::test]
    async fn completed_sessions_do_not_re_execute() {
        let stage = Arc::new(AppendStage::new("only", StageOutcome::Complete));
        let runs = stage.runs.clone();
        let pipeline = PipelineBuilder::new("test")
            .add_stage(stage, "only_error")
            .build();
        let (runner, storage) = runner_for(pipeline);

        let session = Session::new_from_stage("s1".to_string(), "test", "only");
        storage.save(session).await.unwrap();

        runner.run("s1").await.unwrap();
        let again = runner.run("s1").await.unwrap();
        assert_eq!(again.status, RunStatus::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = Session::new_from_stage("s1".to_string(), "test", "first");
        session.context.set("key", "value").await;

        storage.save(session).await.unwrap();
        let loaded = storage.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.current_stage_id, "first");
        let value: String = loaded.context.get("key").await.unwrap();
        assert_eq!(value, "value");

        storage.delete("s1").await.unwrap();
        assert!(storage.get("s1").await.unwrap().is_none());
    }
}
